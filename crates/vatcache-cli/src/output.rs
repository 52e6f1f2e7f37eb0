//! Human and JSON rendering of query results.

use anyhow::Result;
use serde::Serialize;
use serde_json::json;

use vatcache_core::models::{Controller, Pilot, Snapshot};
use vatcache_core::queries::{AirportCount, AirportInfo};
use vatcache_core::utils::truncate_string;
use vatcache_core::{Config, NetworkEvent, SnapshotStore, Upstream};

/// Width of the name column in tables
const NAME_WIDTH: usize = 24;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn route(pilot: &Pilot) -> String {
    match (pilot.departure(), pilot.arrival()) {
        (None, None) => "no flight plan".to_string(),
        (dep, arr) => format!("{} -> {}", dep.unwrap_or("????"), arr.unwrap_or("????")),
    }
}

fn pilot_line(pilot: &Pilot) -> String {
    let altitude = pilot
        .altitude
        .map(|a| format!("{} ft", a))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<10} {:>8}  {:<width$}  {:>9}  {}",
        pilot.callsign,
        pilot.cid,
        truncate_string(&pilot.name, NAME_WIDTH),
        altitude,
        route(pilot),
        width = NAME_WIDTH
    )
}

fn controller_line(controller: &Controller) -> String {
    format!(
        "{:<14} {:>8}  {:<width$}  {}",
        controller.callsign,
        controller.cid,
        truncate_string(&controller.name, NAME_WIDTH),
        controller.frequency.as_deref().unwrap_or("-"),
        width = NAME_WIDTH
    )
}

fn event_lines(event: &NetworkEvent) -> Vec<String> {
    match event {
        NetworkEvent::NewPilots(pilots) => pilots
            .iter()
            .map(|p| format!("+ pilot      {}", pilot_line(p)))
            .collect(),
        NetworkEvent::NewControllers(controllers) => controllers
            .iter()
            .map(|c| format!("+ controller {}", controller_line(c)))
            .collect(),
    }
}

pub fn print_count(count: Option<u64>, json: bool) -> Result<()> {
    if json {
        return print_json(&json!({ "count": count }));
    }
    match count {
        Some(n) => println!("{}", n),
        None => println!("unknown"),
    }
    Ok(())
}

pub fn print_pilot(pilot: Option<&Pilot>, json: bool) -> Result<()> {
    if json {
        return print_json(&pilot);
    }
    match pilot {
        Some(p) => println!("{}", pilot_line(p)),
        None => println!("Not connected"),
    }
    Ok(())
}

pub fn print_pilots(pilots: &[Pilot], json: bool) -> Result<()> {
    if json {
        return print_json(pilots);
    }
    for pilot in pilots {
        println!("{}", pilot_line(pilot));
    }
    println!("{} pilots", pilots.len());
    Ok(())
}

pub fn print_controllers(controllers: &[Controller], json: bool) -> Result<()> {
    if json {
        return print_json(controllers);
    }
    for controller in controllers {
        println!("{}", controller_line(controller));
    }
    println!("{} controllers", controllers.len());
    Ok(())
}

pub fn print_airport(icao: &str, info: Option<&AirportInfo>, json: bool) -> Result<()> {
    if json {
        return print_json(&info);
    }
    let Some(info) = info else {
        println!("No airport given");
        return Ok(());
    };

    println!("{}", icao);
    if let Some(ref atis) = info.atis {
        println!(
            "  ATIS {} {}",
            atis.atis_code.as_deref().unwrap_or("-"),
            atis.station.frequency.as_deref().unwrap_or("")
        );
    }
    println!("  Controllers ({})", info.controllers.len());
    for controller in &info.controllers {
        println!("    {}", controller_line(controller));
    }
    println!("  Pilots ({})", info.pilots.len());
    for pilot in &info.pilots {
        println!("    {}", pilot_line(pilot));
    }
    Ok(())
}

pub fn print_popular(airports: &[AirportCount], json: bool) -> Result<()> {
    if json {
        return print_json(airports);
    }
    for (rank, airport) in airports.iter().enumerate() {
        println!("{:>2}. {:<6} {}", rank + 1, airport.id, airport.count);
    }
    Ok(())
}

pub fn print_status<U: Upstream>(
    store: &SnapshotStore<U>,
    snapshot: Option<&Snapshot>,
    stale: bool,
    json: bool,
) -> Result<()> {
    if json {
        return print_json(&json!({
            "data_file": store.current_path(),
            "updated_at": snapshot.map(|s| s.updated_at),
            "stale": stale,
            "stale_after_secs": store.stale_after().num_seconds(),
            "pilots": snapshot.map(|s| s.pilots.len()),
            "controllers": snapshot.map(|s| s.controllers.len()),
        }));
    }

    println!("Data file:   {}", store.current_path().display());
    match snapshot {
        Some(s) => {
            println!("Updated:     {} ({})", s.updated_at.to_rfc3339(), s.age_display());
            println!(
                "Stale:       {} (after {}s)",
                if stale { "yes" } else { "no" },
                store.stale_after().num_seconds()
            );
            println!("Pilots:      {}", s.pilots.len());
            println!("Controllers: {}", s.controllers.len());
        }
        None => println!("No snapshot cached yet"),
    }
    Ok(())
}

pub fn print_event(event: &NetworkEvent, json: bool) -> Result<()> {
    if event.is_empty() {
        return Ok(());
    }
    if json {
        let (kind, entries) = match event {
            NetworkEvent::NewPilots(p) => ("new_pilots", serde_json::to_value(p)?),
            NetworkEvent::NewControllers(c) => ("new_controllers", serde_json::to_value(c)?),
        };
        println!("{}", json!({ "event": kind, "entries": entries }));
        return Ok(());
    }
    for line in event_lines(event) {
        println!("{}", line);
    }
    Ok(())
}

pub fn print_config(config: &Config, json: bool) -> Result<()> {
    if json {
        return print_json(config);
    }
    println!("Data dir:         {}", config.cache_dir()?.display());
    println!("Stale after:      {}s", config.stale_after().as_secs());
    println!("Refresh interval: {}s", config.refresh_interval().as_secs());
    println!("Request timeout:  {}s", config.request_timeout().as_secs());
    match config.status_url {
        Some(ref url) => println!("Status URL:       {}", url),
        None => println!("Status URL:       default"),
    }
    for url in &config.data_urls {
        println!("Mirror:           {}", url);
    }
    Ok(())
}
