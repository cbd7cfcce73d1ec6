/// Building blocks shared by models
pub mod layers;

/// Venue prediction from title and abstract
pub mod venue_classifier;
