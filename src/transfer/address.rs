//! Host-port codecs for PORT/EPRT arguments and PASV/EPSV replies.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::error::TransferError;
use crate::protocol::Response;
use crate::protocol::responses::{ENTERING_EXTENDED_PASSIVE, ENTERING_PASSIVE};

/// Parses `h1,h2,h3,h4,p1,p2`.
pub fn parse_port_argument(argument: &str) -> Result<SocketAddr, TransferError> {
    let fields = argument
        .split(',')
        .map(|field| field.trim().parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| TransferError::InvalidPortCommand(argument.to_string()))?;

    let [h1, h2, h3, h4, p1, p2] = fields[..] else {
        return Err(TransferError::InvalidPortCommand(argument.to_string()));
    };

    let ip = Ipv4Addr::new(h1, h2, h3, h4);
    let port = u16::from(p1) << 8 | u16::from(p2);
    Ok(SocketAddr::new(IpAddr::V4(ip), port))
}

/// Parses `<d>proto<d>address<d>port<d>` (RFC 2428). The delimiter is the
/// first character of the argument.
pub fn parse_eprt_argument(argument: &str) -> Result<SocketAddr, TransferError> {
    let invalid = || TransferError::InvalidPortCommand(argument.to_string());

    let delimiter = argument.chars().next().ok_or_else(invalid)?;
    let fields: Vec<&str> = argument.split(delimiter).collect();
    let [_, protocol, address, port, trailing] = fields[..] else {
        return Err(invalid());
    };
    if !trailing.is_empty() {
        return Err(invalid());
    }

    let ip = match protocol {
        "1" => IpAddr::V4(address.parse::<Ipv4Addr>().map_err(|_| invalid())?),
        "2" => IpAddr::V6(address.parse::<Ipv6Addr>().map_err(|_| invalid())?),
        other => return Err(TransferError::UnsupportedNetworkProtocol(other.to_string())),
    };
    let port = port.parse::<u16>().map_err(|_| invalid())?;

    Ok(SocketAddr::new(ip, port))
}

/// An active target must point back at the control peer and use an
/// unprivileged port.
pub fn validate_active_target(target: SocketAddr, control_peer: IpAddr) -> Result<(), TransferError> {
    if target.ip().to_canonical() != control_peer.to_canonical() {
        return Err(TransferError::IpMismatch {
            expected: control_peer.to_string(),
            provided: target.ip().to_string(),
        });
    }
    if target.port() < 1024 {
        return Err(TransferError::InvalidPortRange(target.port()));
    }
    Ok(())
}

/// `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`. PASV can only describe IPv4.
pub fn passive_reply(address: SocketAddr) -> Result<Response, TransferError> {
    let ip = match address.ip().to_canonical() {
        IpAddr::V4(ip) => ip,
        IpAddr::V6(_) => {
            return Err(TransferError::UnsupportedNetworkProtocol(
                "PASV requires IPv4, use EPSV".into(),
            ));
        }
    };
    let [h1, h2, h3, h4] = ip.octets();
    let [p1, p2] = address.port().to_be_bytes();

    Ok(Response::new(
        ENTERING_PASSIVE,
        format!(
            "Entering Passive Mode ({},{},{},{},{},{})",
            h1, h2, h3, h4, p1, p2
        ),
    ))
}

/// `229 Entering Extended Passive Mode (|||port|)`
pub fn extended_passive_reply(port: u16) -> Response {
    Response::new(
        ENTERING_EXTENDED_PASSIVE,
        format!("Entering Extended Passive Mode (|||{}|)", port),
    )
}
