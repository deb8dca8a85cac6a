use super::Exchange;
use crate::error::Result;
use crate::group::ProcessGroup;
use crate::protocol::Message;

/// Send to every other rank in ascending order, then receive from every
/// other rank in ascending order.
pub(super) async fn exchange(group: &ProcessGroup) -> Result<Exchange> {
    let rank = group.rank();
    let world = group.world_size();
    let mut report = Exchange::default();

    for dst in (0..world).filter(|&r| r != rank) {
        group.send(Message::from_rank(rank), dst).await?;
        report.sent_to.push(dst);
    }
    for src in (0..world).filter(|&r| r != rank) {
        let msg = group.recv(src).await?;
        report.received.push((src, msg.value));
    }

    Ok(report)
}
