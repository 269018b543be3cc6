//! Network reachability probes backing both `Database`/`ServiceMesh`
//! connection setup and the `PortAccessible`/`Healthcheck` assertions.

use std::time::Duration;

use clockwork_driver::DriverError;
use tokio::net::{TcpStream, UdpSocket};

pub async fn tcp_probe(host: &str, port: u16, timeout: Duration) -> Result<bool, DriverError> {
  let addr = format!("{host}:{port}");
  match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
    Ok(Ok(_stream)) => Ok(true),
    Ok(Err(_)) => Ok(false),
    Err(_) => Ok(false),
  }
}

/// UDP has no handshake; "accessible" means a probe datagram can be sent
/// without the kernel immediately reporting the destination unreachable.
pub async fn udp_probe(host: &str, port: u16, timeout: Duration) -> Result<bool, DriverError> {
  let addr = format!("{host}:{port}");
  let probe = async {
    let socket = UdpSocket::bind("0.0.0.0:0")
      .await
      .map_err(|e| DriverError::Unavailable(format!("bind udp probe socket: {e}")))?;
    socket
      .connect(&addr)
      .await
      .map_err(|e| DriverError::Unavailable(format!("resolve {addr}: {e}")))?;
    Ok::<_, DriverError>(socket.send(&[]).await.is_ok())
  };
  match tokio::time::timeout(timeout, probe).await {
    Ok(result) => result,
    Err(_) => Ok(false),
  }
}

pub async fn http_get(url: &str, timeout: Duration) -> Result<u16, DriverError> {
  let client = reqwest::Client::builder()
    .timeout(timeout)
    .build()
    .map_err(|e| DriverError::Unavailable(format!("build http client: {e}")))?;
  let response = client
    .get(url)
    .send()
    .await
    .map_err(|e| DriverError::Timeout(format!("GET {url}: {e}")))?;
  Ok(response.status().as_u16())
}
