pub mod trials_pipeline;
