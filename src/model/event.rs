/// 写入方抛出、通知服务消费的事件
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEvent {
    RankChanged {
        user_id: String,
        old_rank: u32,
        new_rank: u32,
    },
    ChallengeCreated {
        date: String,
    },
}
