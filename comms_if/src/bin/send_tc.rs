//! Send a single telecommand to the drive executable and print the response.
//!
//! Usage: `send_tc drive 1.0 0.0 0.0 --field-relative`

use color_eyre::{eyre::WrapErr, Result};
use comms_if::{
    net::{MonitoredSocket, NetParams, SocketOptions},
    tc::{Tc, TcResponse},
};
use structopt::StructOpt;

fn main() -> Result<()> {
    color_eyre::install()?;

    let tc = Tc::from_args();

    let net_params: NetParams = util::params::load("net.toml")
        .wrap_err("Could not load the network parameters")?;

    let ctx = zmq::Context::new();

    let socket_options = SocketOptions {
        connect_timeout: 1000,
        recv_timeout: 1000,
        send_timeout: 1000,
        req_correlate: true,
        req_relaxed: true,
        ..Default::default()
    };

    let socket = MonitoredSocket::new(
        &ctx,
        zmq::REQ,
        socket_options,
        &net_params.tc_endpoint
    ).wrap_err("Could not connect to the telecommand server")?;

    println!("Sending {:?}", tc);
    socket.send_json(&tc).wrap_err("Could not send the telecommand")?;

    let response: TcResponse = socket.recv_json(0)
        .wrap_err("No response from the telecommand server")?;

    println!("Response: {:?}", response);

    Ok(())
}
