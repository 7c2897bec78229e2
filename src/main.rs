// EsoxSolutions.ResourcePool
// Demo: pooling TCP connections to a local echo listener

use esox_resourcepool::{PoolConfiguration, ResourcePool};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || echo(stream));
        }
    });

    let config = PoolConfiguration::new()
        .with_min_capacity(2)
        .with_max_capacity(4)
        .with_idle_timeout(Duration::from_secs(15));

    let pool = ResourcePool::new(
        config,
        move || Ok(TcpStream::connect(addr)?),
        |stream: TcpStream| Ok(stream.shutdown(std::net::Shutdown::Both)?),
    )?;
    info!(idle = pool.idle_count(), "pool ready");

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let pool = pool.clone();
            thread::spawn(move || -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
                let mut conn = pool.acquire()?;
                writeln!(*conn, "request {i}")?;
                let mut reply = String::new();
                BufReader::new(&*conn).read_line(&mut reply)?;
                conn.release()?;
                Ok(reply.trim_end().to_string())
            })
        })
        .collect();

    for worker in workers {
        match worker.join() {
            Ok(Ok(reply)) => info!(%reply, "round trip"),
            Ok(Err(err)) => warn!(error = %err, "request failed"),
            Err(_) => warn!("worker panicked"),
        }
    }

    let metrics = pool.get_metrics();
    info!(
        created = metrics.total_created,
        acquired = metrics.total_acquired,
        waits = metrics.exhausted_waits,
        "workload finished"
    );

    pool.drain_all()?;
    Ok(())
}

fn echo(stream: TcpStream) {
    let Ok(mut writer) = stream.try_clone() else {
        return;
    };
    for line in BufReader::new(stream).lines() {
        let Ok(line) = line else { break };
        if writeln!(writer, "echo: {line}").is_err() {
            break;
        }
    }
}
