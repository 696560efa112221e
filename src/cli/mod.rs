use anyhow::Result;
use clap::Parser;

use crate::bus::dbus::DbusDialer;
use crate::bus::{BusConnector, ReconnectPolicy};
use crate::config::Config;
use crate::player::PlayerClient;
use crate::tui::Dashboard;

#[derive(Parser)]
#[command(name = "spotify-remote")]
#[command(about = "Remote-control a running media player from the terminal")]
#[command(version)]
#[command(
    after_help = "Keys: h/l skip, space play/pause, r redraw, : command line.\n\
                  Commands: :q leave, :q! quit the player too, :next, :prev, :toggle, :shuffle, :vol N."
)]
pub struct Cli {}

pub struct App {
    pub config: Config,
}

impl App {
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        Ok(Self { config })
    }

    /// Connects to the player and runs the dashboard until the user leaves.
    pub fn run(&self) -> Result<()> {
        let dialer = DbusDialer::new(self.config.bus.clone());
        let bus = BusConnector::connect(dialer, ReconnectPolicy::from(&self.config.reconnect))?;

        let mut dashboard = Dashboard::new(
            PlayerClient::new(bus),
            self.config.dashboard.redraw_interval(),
        );
        dashboard.run()
    }
}
