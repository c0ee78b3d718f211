use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoutineError {
    #[error("Routine '{routine}' failed to load its input")]
    LoadFailed { routine: String },
    #[error("Routine '{routine}' failed to shape its data")]
    ShapeFailed { routine: String },
    #[error("Routine '{routine}' failed to write its output")]
    WriteFailed { routine: String },
}

impl RoutineError {
    pub fn load_failed<S: Into<String>>(routine: S) -> Self {
        RoutineError::LoadFailed {
            routine: routine.into(),
        }
    }

    pub fn shape_failed<S: Into<String>>(routine: S) -> Self {
        RoutineError::ShapeFailed {
            routine: routine.into(),
        }
    }

    pub fn write_failed<S: Into<String>>(routine: S) -> Self {
        RoutineError::WriteFailed {
            routine: routine.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait Routine: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> error_stack::Result<(), RoutineError>;
}
