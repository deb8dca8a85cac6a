use super::Exchange;
use crate::error::Result;
use crate::group::ProcessGroup;
use crate::protocol::Message;
use crate::types::Rank;

/// Rank 0 is the hub.
const HUB: Rank = 0;

/// Hub: receive from every spoke in rank order, then send to every spoke in
/// the same order. Spoke: send to the hub, then receive from it.
pub(super) async fn exchange(group: &ProcessGroup) -> Result<Exchange> {
    let rank = group.rank();
    let world = group.world_size();
    let mut report = Exchange::default();

    if rank == HUB {
        for spoke in 1..world {
            let msg = group.recv(spoke).await?;
            report.received.push((spoke, msg.value));
        }
        for spoke in 1..world {
            group.send(Message::from_rank(rank), spoke).await?;
            report.sent_to.push(spoke);
        }
    } else {
        group.send(Message::from_rank(rank), HUB).await?;
        report.sent_to.push(HUB);
        let msg = group.recv(HUB).await?;
        report.received.push((HUB, msg.value));
    }

    Ok(report)
}
