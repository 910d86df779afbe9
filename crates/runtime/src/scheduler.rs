//! The shared tick driver.
//!
//! One periodic task serves every real-time session; sessions are never given
//! their own timer. The driver is spawned lazily when the first real-time
//! session starts and stops itself cooperatively: each tick's reply carries
//! the number of active real-time sessions, and a zero ends the loop. The
//! worker respawns a driver when the next real-time session begins.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::worker::Command;

pub(crate) struct TickDriver;

impl TickDriver {
    /// Spawns the driver task. The sender is weak so a driver can never keep
    /// a shut-down runtime alive; failing to upgrade ends the loop.
    pub(crate) fn spawn(
        command_tx: mpsc::WeakSender<Command>,
        period: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // An interval's first tick completes immediately; skip it so the
            // first real tick lands one full period after spawn.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(tx) = command_tx.upgrade() else {
                    break;
                };
                let (reply_tx, reply_rx) = oneshot::channel();
                let sent = tx
                    .send(Command::Tick {
                        elapsed: period,
                        from_driver: true,
                        reply: Some(reply_tx),
                    })
                    .await;
                drop(tx);
                if sent.is_err() {
                    break;
                }

                match reply_rx.await {
                    Ok(0) => break,
                    Ok(remaining) => trace!(remaining, "tick delivered"),
                    Err(_) => break,
                }
            }

            debug!("tick driver stopped");
        })
    }
}
