use tokio::net::{TcpListener, TcpStream};
use anyhow::{Context, Result};

/// Start listening TCP on address and return the listener.
/// Consumer should `accept().await` and hand streams to `Connection::spawn`.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let l = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    Ok(l)
}

pub async fn connect(addr: &str) -> Result<TcpStream> {
    let s = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;
    s.set_nodelay(true)?;
    Ok(s)
}
