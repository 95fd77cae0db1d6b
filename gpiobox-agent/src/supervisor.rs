//! The run loop tying the stream client and heartbeat together.
//!
//! The HTTP surface runs as its own task on the same runtime; the two
//! share nothing but the [`OutputState`] handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::info;

use gpiobox_core::{Clock, HeartbeatScheduler, OutputState, StreamClient};

pub struct Supervisor {
    client: StreamClient,
    heartbeat: HeartbeatScheduler,
    output: OutputState,
    clock: Arc<dyn Clock>,
    quantum: Duration,
    running: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new(
        client: StreamClient,
        heartbeat: HeartbeatScheduler,
        output: OutputState,
        clock: Arc<dyn Clock>,
        quantum: Duration,
    ) -> Self {
        Self {
            client,
            heartbeat,
            output,
            clock,
            quantum,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Handle that stops [`run`](Self::run) when set to `false`.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn client(&self) -> &StreamClient {
        &self.client
    }

    /// One iteration: service the client for up to one quantum, evaluate
    /// the heartbeat, yield. Returns whether the heartbeat fired.
    pub async fn step(&mut self) -> bool {
        self.client.service(self.quantum).await;
        let fired = self
            .heartbeat
            .tick(self.clock.now_ms(), &self.output, &self.client);
        tokio::task::yield_now().await;
        fired
    }

    /// Loop until the stop handle is cleared.
    pub async fn run(&mut self) {
        info!(
            quantum_ms = self.quantum.as_millis() as u64,
            interval_ms = self.heartbeat.interval_ms(),
            event = self.heartbeat.event(),
            "supervisor started"
        );
        while self.running.load(Ordering::SeqCst) {
            self.step().await;
        }
        info!(phase = %self.client.phase(), "supervisor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gpiobox_core::{BoxError, ClientConfig, Connector, Endpoint, Link, ManualClock};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const OPEN: &str = r#"0{"sid":"sv","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

    struct QueueConnector(Mutex<VecDeque<Link>>);

    #[async_trait]
    impl Connector for QueueConnector {
        async fn connect(&self, _endpoint: &Endpoint) -> Result<Link, BoxError> {
            self.0.lock().unwrap().pop_front().ok_or(BoxError::ChannelClosed)
        }
    }

    fn supervisor(links: Vec<Link>, output: OutputState, clock: Arc<ManualClock>) -> Supervisor {
        let client = StreamClient::new(
            ClientConfig::new(Endpoint::new("127.0.0.1", 3000, "/socket.io/?EIO=4")),
            Arc::new(QueueConnector(Mutex::new(links.into()))),
            output.clone(),
            clock.clone(),
        );
        Supervisor::new(
            client,
            HeartbeatScheduler::new(2_000),
            output,
            clock,
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn heartbeat_ticks_while_disconnected() {
        let clock = Arc::new(ManualClock::new(0));
        let mut sv = supervisor(Vec::new(), OutputState::in_memory(false), clock.clone());

        assert!(!sv.step().await);
        clock.set(2_000);
        assert!(sv.step().await);
        assert!(!sv.client().is_connected());
    }

    #[tokio::test]
    async fn steps_connect_dispatch_and_publish() {
        let (client_end, mut server_end) = Link::pair(32);
        let clock = Arc::new(ManualClock::new(0));
        let output = OutputState::in_memory(false);
        let mut sv = supervisor(vec![client_end], output.clone(), clock.clone());

        server_end.send(OPEN.into()).await.unwrap();
        sv.step().await; // connect
        sv.step().await; // OPEN
        assert!(sv.client().is_connected());
        assert_eq!(server_end.recv().await.as_deref(), Some("40"));

        server_end.send(r#"421["on"]"#.into()).await.unwrap();
        clock.set(1_500);
        sv.step().await;
        assert!(output.get());
        assert_eq!(server_end.recv().await.as_deref(), Some(r#"431[{"now":1500}]"#));

        clock.set(2_000);
        assert!(sv.step().await);
        assert_eq!(
            server_end.recv().await.as_deref(),
            Some(r#"42["state",{"now":2000,"state":true}]"#)
        );
    }

    #[tokio::test]
    async fn run_returns_once_stopped() {
        let clock = Arc::new(ManualClock::new(0));
        let mut sv = supervisor(Vec::new(), OutputState::in_memory(false), clock);
        let stop = sv.stop_handle();
        stop.store(false, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(1), sv.run())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn run_stops_from_another_task() {
        let clock = Arc::new(ManualClock::new(0));
        let mut sv = supervisor(Vec::new(), OutputState::in_memory(false), clock);
        let stop = sv.stop_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stop.store(false, Ordering::SeqCst);
        });
        tokio::time::timeout(Duration::from_secs(2), sv.run())
            .await
            .unwrap();
    }
}
