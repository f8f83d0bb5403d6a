//! Client module
//!
//! The client half of the suite: the session state machine, its collaborator
//! interface with a blocking TCP implementation, and local directory
//! browsing.

pub mod local;
pub mod results;
pub mod session;
pub mod state;
pub mod stream;
pub mod transport;

pub use local::list_local;
pub use results::{DirEntry, SessionEvent, SessionOutcome, SessionReply};
pub use session::{Session, local_target};
pub use state::SessionState;
pub use stream::{FtpStream, TcpConnector};
pub use transport::{FtpConnection, FtpConnector};
