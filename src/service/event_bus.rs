use crate::model::event::GameEvent;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};

/// 事件队列长度
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// 事件发送端，发送不阻塞写入流程
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<GameEvent>,
}

impl EventBus {
    pub fn channel(capacity: usize) -> (Self, Receiver<GameEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    pub fn publish(&self, event: GameEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!("event queue full, dropped event:{:?}", event);
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!("event queue closed, dropped event:{:?}", event);
            }
        }
    }

    /// 不能丢的事件：队列满时等待空位
    pub async fn deliver(&self, event: GameEvent) {
        if let Err(err) = self.sender.send(event).await {
            tracing::warn!("event queue closed, dropped event:{:?}", err.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_never_blocks_when_full() {
        let (bus, mut receiver) = EventBus::channel(1);
        bus.publish(GameEvent::ChallengeCreated {
            date: "2026-01-27".to_string(),
        });
        bus.publish(GameEvent::ChallengeCreated {
            date: "2026-01-28".to_string(),
        });
        assert_eq!(
            receiver.recv().await,
            Some(GameEvent::ChallengeCreated {
                date: "2026-01-27".to_string()
            })
        );
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn deliver_waits_for_room_instead_of_dropping() {
        let (bus, mut receiver) = EventBus::channel(1);
        bus.publish(GameEvent::RankChanged {
            user_id: "u1".to_string(),
            old_rank: 30,
            new_rank: 3,
        });

        let sender = bus.clone();
        let pending = tokio::spawn(async move {
            sender
                .deliver(GameEvent::ChallengeCreated {
                    date: "2026-01-27".to_string(),
                })
                .await;
        });
        assert!(matches!(
            receiver.recv().await,
            Some(GameEvent::RankChanged { .. })
        ));
        pending.await.unwrap();
        assert_eq!(
            receiver.recv().await,
            Some(GameEvent::ChallengeCreated {
                date: "2026-01-27".to_string()
            })
        );
    }
}
