pub mod cleaning;
pub mod contributors;
pub mod output;
pub mod pca;
pub mod pipeline;
pub mod standardize;
pub mod variance;
