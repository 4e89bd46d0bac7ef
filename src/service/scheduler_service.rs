use crate::config::game_config::{GameConfig, RankMode};
use crate::service::daily_challenge_service::DailyChallengeService;
use crate::service::rank_service::RankService;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;

/// 定时任务：每日挑战生成、批量排名
pub struct SchedulerService {
    sched: JobScheduler,
    daily_service: Arc<DailyChallengeService>,
    rank_service: RankService,
    config: Arc<GameConfig>,
}

impl SchedulerService {
    pub fn new(
        sched: &JobScheduler,
        daily_service: &Arc<DailyChallengeService>,
        rank_service: &RankService,
        config: &Arc<GameConfig>,
    ) -> Self {
        Self {
            sched: sched.clone(),
            daily_service: Arc::clone(daily_service),
            rank_service: rank_service.clone(),
            config: Arc::clone(config),
        }
    }

    /// 注册所有任务并启动调度器
    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        self.start_daily_challenge_job().await?;
        if self.config.rank_mode == RankMode::Batch {
            self.start_rank_batch_job().await?;
        }
        self.sched.start().await
    }

    // cron 按 UTC 解析
    async fn start_daily_challenge_job(&self) -> Result<Uuid, JobSchedulerError> {
        let daily_service = Arc::clone(&self.daily_service);
        let job = Job::new_async(self.config.daily_challenge_cron.as_str(), move |_uuid, _l| {
            let n_daily_service = Arc::clone(&daily_service);
            Box::pin(async move {
                match n_daily_service.generate_for_today().await {
                    Ok(outcome) => tracing::info!(
                        "daily challenge job - date:{} | created:{} | repaired:{} | ready:{}",
                        outcome.date,
                        outcome.created,
                        outcome.repaired,
                        outcome.ready
                    ),
                    Err(err) => tracing::error!("daily challenge job - error:{}", err),
                }
            })
        })
        .map_err(|err| {
            tracing::error!(
                "start_daily_challenge_job - cron:{} | error:{}",
                self.config.daily_challenge_cron,
                err
            );
            err
        })?;
        self.sched.add(job).await
    }

    async fn start_rank_batch_job(&self) -> Result<Uuid, JobSchedulerError> {
        let rank_service = self.rank_service.clone();
        let job = Job::new_async(self.config.rank_batch_cron.as_str(), move |_uuid, _l| {
            let n_rank_service = rank_service.clone();
            Box::pin(async move {
                if let Err(err) = n_rank_service.run_scheduled_batch().await {
                    tracing::error!("rank batch job - error:{}", err);
                }
            })
        })
        .map_err(|err| {
            tracing::error!(
                "start_rank_batch_job - cron:{} | error:{}",
                self.config.rank_batch_cron,
                err
            );
            err
        })?;
        self.sched.add(job).await
    }
}
