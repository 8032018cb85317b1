pub mod day;
pub mod feature;
pub mod forecast;
pub mod metrics;
pub mod price;
pub mod vol;
