//! Order gateway demo.
//!
//! Several clients fire new, amend and cancel orders at a gateway that may
//! only send a few orders per interval. Cancels jump the queue.

use std::time::Duration;

use clap::Parser;
use send_dispatch::DispatchError;
use send_dispatch::DispatchHandle;
use send_dispatch::Dispatcher;
use send_limit::OnSend;
use send_limit::ThrottlerConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Send orders through a sliding window throttle")]
struct Args {
    /// Maximum orders sent within any interval
    #[arg(long, default_value_t = 3)]
    capacity: usize,

    /// Width of the sliding window, e.g. `1s` or `250ms`
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    interval: Duration,

    /// Number of concurrent clients producing orders
    #[arg(long, default_value_t = 1)]
    clients: u32,
}

trait Order {
    fn describe(&self) -> &str;
}

struct NewOrder(String);
struct AmendOrder(String);
struct CancelOrder(String);

impl Order for NewOrder {
    fn describe(&self) -> &str {
        &self.0
    }
}

impl Order for AmendOrder {
    fn describe(&self) -> &str {
        &self.0
    }
}

impl Order for CancelOrder {
    fn describe(&self) -> &str {
        &self.0
    }
}

/// Stands in for the exchange connection; logs instead of sending.
#[derive(Default)]
struct Gateway {
    sent: usize,
}

impl<O: Order> OnSend<O> for Gateway {
    fn on_send(&mut self, order: O) {
        self.sent += 1;
        info!(order = order.describe(), "sending");
    }
}

type Handle = DispatchHandle<CancelOrder, Gateway>;

struct Client {
    id: u32,
    next_order: u32,
    handle: Handle,
}

impl Client {
    async fn run(mut self) -> Result<(), DispatchError> {
        self.new_order().await?;
        self.amend_order().await?;
        self.cancel_order().await?;

        for _ in 0..4 {
            self.amend_order().await?;
        }
        for _ in 0..4 {
            self.cancel_order().await?;
        }
        Ok(())
    }

    fn describe(&mut self, kind: &str) -> String {
        let description = format!("{kind} Order Id: {} from client {}", self.next_order, self.id);
        self.next_order += 1;
        description
    }

    async fn new_order(&mut self) -> Result<(), DispatchError> {
        let order = NewOrder(self.describe("New"));
        self.handle.send(order).await
    }

    async fn amend_order(&mut self) -> Result<(), DispatchError> {
        let order = AmendOrder(self.describe("Amend"));
        self.handle.send(order).await
    }

    async fn cancel_order(&mut self) -> Result<(), DispatchError> {
        let order = CancelOrder(self.describe("Cancel"));
        self.handle.send(order).await
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let throttler = ThrottlerConfig::new(args.capacity, args.interval)
        .build::<CancelOrder, _>(Gateway::default())?;

    info!(
        capacity = args.capacity,
        interval = %humantime::format_duration(args.interval),
        clients = args.clients,
        "starting order gateway"
    );

    let (handle, worker) = Dispatcher::new(throttler).spawn();

    let clients = (1..=args.clients).map(|id| {
        let client = Client {
            id,
            next_order: 0,
            handle: handle.clone(),
        };
        tokio::spawn(client.run())
    });
    for result in futures::future::join_all(clients).await {
        result??;
    }
    drop(handle);

    let throttler = worker.await?;
    info!(sent = throttler.on_send().sent, "all orders sent");

    Ok(())
}
