//! Publish a fixed vision solution, standing in for the vision coprocessor.
//!
//! Every `--drop-every`th frame is published as not visible so that the
//! drive executable's debounce can be observed.

use std::time::{Duration, Instant};

use color_eyre::{eyre::WrapErr, Result};
use comms_if::{
    eqpt::vision::VisionFrame,
    net::{MonitoredSocket, NetParams, SocketOptions},
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "pub_vision")]
struct Opts {
    /// X position from the field centre in meters.
    #[structopt(allow_hyphen_values = true)]
    x_m: f64,

    /// Y position from the field centre in meters.
    #[structopt(allow_hyphen_values = true)]
    y_m: f64,

    /// Yaw in degrees.
    #[structopt(allow_hyphen_values = true)]
    yaw_deg: f64,

    /// Publish rate in Hz.
    #[structopt(long, default_value = "10")]
    rate_hz: f64,

    /// Publish every nth frame as not visible, 0 to never drop.
    #[structopt(long, default_value = "0")]
    drop_every: u64,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    let net_params: NetParams = util::params::load("net.toml")
        .wrap_err("Could not load the network parameters")?;

    let ctx = zmq::Context::new();

    let socket_options = SocketOptions {
        bind: true,
        block_on_first_connect: false,
        ..Default::default()
    };

    let socket = MonitoredSocket::new(
        &ctx,
        zmq::PUB,
        socket_options,
        &net_params.vision_endpoint
    ).wrap_err("Could not open the vision publisher")?;

    println!("Vision publisher open on {}", net_params.vision_endpoint);

    let start = Instant::now();
    let period = Duration::from_secs_f64(1.0 / opts.rate_hz.max(0.1));
    let mut frame_count: u64 = 0;

    loop {
        frame_count += 1;
        let capture_time_s = start.elapsed().as_secs_f64();

        let frame = if opts.drop_every > 0 && frame_count % opts.drop_every == 0 {
            VisionFrame::not_visible(capture_time_s)
        }
        else {
            VisionFrame {
                botpose: Some([opts.x_m, opts.y_m, 0.0, 0.0, 0.0, opts.yaw_deg]),
                capture_time_s,
                visible: true
            }
        };

        if let Err(e) = socket.send_json(&frame) {
            println!("Failed to send frame: {}", e);
        }

        std::thread::sleep(period);
    }
}
