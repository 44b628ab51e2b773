pub mod pearson;
pub mod quantile;
