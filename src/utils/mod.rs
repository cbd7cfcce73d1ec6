/// File utilities
pub mod files;

/// Resolving local and Hugging Face Hub paths
pub mod cached_path;

/// Tensor Utilities
pub mod tensors;

/// Renderer Utilities
pub mod renderer;
