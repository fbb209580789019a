//! Initialization: wait for `hello` and `start`, in either order

use tether_bus::{Inbound, Transport};
use tracing::{debug, info, warn};

use crate::inbox::Inbox;
use crate::session::Session;
use crate::AgentError;

/// Read host messages until both `hello` and `start` have been applied.
///
/// Anything else that arrives first is kept in `inbox` for the step loop.
/// End of input before `hello` fails the run; end of input after `hello`
/// without `start` proceeds with an empty goal.
pub async fn handshake(
    transport: &mut Transport,
    session: &mut Session,
    inbox: &mut Inbox,
) -> Result<(), AgentError> {
    let mut got_hello = false;
    let mut got_start = false;

    while !(got_hello && got_start) {
        match transport.recv().await {
            Some(Inbound::Hello(hello)) => {
                if got_hello {
                    debug!("repeated hello, replacing catalog and policy");
                }
                session.apply_hello(&hello);
                got_hello = true;
            }
            Some(Inbound::Start(start)) => {
                if got_start {
                    debug!("repeated start, replacing goal");
                }
                session.apply_start(&start);
                got_start = true;
            }
            Some(other) => inbox.push(other),
            None if got_hello => {
                warn!("input closed before start, continuing without a goal");
                break;
            }
            None => return Err(AgentError::NoHandshake),
        }
    }

    info!(
        "handshake complete: {} tools allowed, {} queued",
        session.allowed_tools.len(),
        inbox.len()
    );
    Ok(())
}
