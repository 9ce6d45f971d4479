use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadError {
    AlreadyStarted,
    TaskCreateFailed(i32),
}

impl ThreadError {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadError::AlreadyStarted => "Thread has already been started",
            ThreadError::TaskCreateFailed(_) => "Kernel refused to create the task",
        }
    }
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadError::TaskCreateFailed(code) => write!(f, "{} (status {})", self.as_str(), code),
            _ => f.write_str(self.as_str()),
        }
    }
}

pub type ThreadResult<T> = Result<T, ThreadError>;
