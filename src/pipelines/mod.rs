/// Text Classification: venue prediction from title and abstract
pub mod text_classification;
