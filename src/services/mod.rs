pub mod attempt_state;
pub mod exam_session;
pub mod finalizer;
pub mod results;
pub mod synchronizer;
pub mod timer;
