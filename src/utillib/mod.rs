pub mod logging;
pub mod natural_sort;
