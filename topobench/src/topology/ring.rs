use super::Exchange;
use crate::error::Result;
use crate::group::ProcessGroup;
use crate::protocol::Message;

/// Send to the successor, then receive from the predecessor.
///
/// Every rank sends first. The sends complete without a posted receive
/// because each peer's router drains its socket continuously.
pub(super) async fn exchange(group: &ProcessGroup) -> Result<Exchange> {
    let rank = group.rank();
    let world = group.world_size();
    let mut report = Exchange::default();
    if world < 2 {
        return Ok(report);
    }

    let next = (rank + 1) % world;
    let prev = (rank + world - 1) % world;

    group.send(Message::from_rank(rank), next).await?;
    report.sent_to.push(next);

    let msg = group.recv(prev).await?;
    report.received.push((prev, msg.value));

    Ok(report)
}
