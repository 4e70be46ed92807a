pub mod session_binder;

pub use session_binder::{BufferEditor, ClientBinding, ClientError, Editor, SessionBinder};
