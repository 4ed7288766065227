use chrono::prelude::*;
use clap::{arg, command, ArgMatches, Command};

use seatrack::argos::packet::ArgosPacketBuilder;
use seatrack::argos::tx_sched::ArgosTxScheduler;
use seatrack::codec::hex::hexlify;
use seatrack::logging::{GpsInfo, GpsLogEntry, LogHeader, LogType};
use seatrack::protocol::codec as dte_codec;
use seatrack::ArgosConfig;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let matches = command!()
        .subcommand_required(true)
        .subcommand(
            Command::new("encode")
                .about("Encode a control-protocol request frame")
                .arg(arg!(<COMMAND> "Command verb, e.g. PARMR"))
                .arg(arg!([PAYLOAD] "Comma separated arguments").default_value("")),
        )
        .subcommand(
            Command::new("decode")
                .about("Decode a control-protocol request frame")
                .arg(arg!(<FRAME> "Frame, e.g. '$PARMR#005;ARP05'"))
                .arg(arg!(--json "Emit the decoded frame as JSON")),
        )
        .subcommand(
            Command::new("packet")
                .about("Build a short Argos uplink frame from a fix")
                .arg(
                    arg!(--lat <DEG> "Latitude in degrees")
                        .required(true)
                        .allow_hyphen_values(true),
                )
                .arg(
                    arg!(--lon <DEG> "Longitude in degrees")
                        .required(true)
                        .allow_hyphen_values(true),
                )
                .arg(arg!(--speed <MMS> "Ground speed in mm/s").default_value("0"))
                .arg(arg!(--heading <DEG> "Heading in degrees").default_value("0"))
                .arg(arg!(--altitude <MM> "Height above MSL in mm").default_value("0"))
                .arg(arg!(--battery <MV> "Battery voltage in mV").default_value("3600"))
                .arg(arg!(--time <EPOCH> "Schedule time, epoch seconds")),
        )
        .subcommand(
            Command::new("schedule")
                .about("Preview the next duty-cycle transmission instant")
                .arg(arg!(--tr <SECS> "Repetition period TR_NOM in seconds").default_value("60"))
                .arg(arg!(--duty <MASK> "24-bit duty cycle mask in hex").default_value("FFFFFF"))
                .arg(arg!(--now <EPOCH> "Current time, epoch seconds"))
                .arg(arg!(--seed <ID> "Argos hex id used as jitter seed").default_value("0"))
                .arg(arg!(--jitter "Enable TX jitter")),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("encode", sub)) => encode(sub),
        Some(("decode", sub)) => decode(sub),
        Some(("packet", sub)) => packet(sub),
        Some(("schedule", sub)) => schedule(sub),
        _ => unreachable!("subcommand required"),
    }
}

fn encode(matches: &ArgMatches) {
    let verb = matches.get_one::<String>("COMMAND").unwrap().to_uppercase();
    let payload = matches.get_one::<String>("PAYLOAD").unwrap();
    println!("${verb}#{:03X};{payload}\r", payload.len());
}

fn decode(matches: &ArgMatches) {
    let frame = matches.get_one::<String>("FRAME").unwrap();
    match dte_codec::decode_request(frame) {
        Ok(request) => {
            if matches.get_flag("json") {
                let args: Vec<serde_json::Value> = request
                    .descriptor
                    .args
                    .iter()
                    .zip(&request.args)
                    .map(|(spec, arg)| {
                        serde_json::json!({ "name": spec.name, "value": format!("{arg:?}") })
                    })
                    .collect();
                let doc = serde_json::json!({
                    "command": request.descriptor.name,
                    "args": args,
                });
                println!("{doc}");
                return;
            }
            println!("command: {}", request.descriptor.name);
            for (spec, arg) in request.descriptor.args.iter().zip(&request.args) {
                println!("  {}: {:?}", spec.name, arg);
            }
        },
        Err(failure) => {
            eprintln!(
                "bad frame ({}): {}",
                failure.name.as_deref().unwrap_or("?"),
                failure.error
            );
            std::process::exit(1);
        },
    }
}

fn packet(matches: &ArgMatches) {
    let lat: f64 = parse(matches, "lat");
    let lon: f64 = parse(matches, "lon");
    let g_speed: i32 = parse(matches, "speed");
    let head_mot: f32 = parse(matches, "heading");
    let h_msl: i32 = parse(matches, "altitude");
    let batt_voltage: u16 = parse(matches, "battery");
    let sched_time: i64 = matches
        .get_one::<String>("time")
        .map(|t| t.parse().expect("bad --time"))
        .unwrap_or_else(|| Utc::now().timestamp());

    let entry = GpsLogEntry {
        header: LogHeader::with_time(LogType::Gps, sched_time),
        info: GpsInfo {
            valid: true,
            lat,
            lon,
            g_speed,
            head_mot,
            h_msl,
            batt_voltage,
            fix_type: 3,
            sched_time,
            ..GpsInfo::default()
        },
    };
    let frame = ArgosPacketBuilder::build_short_packet(&entry, false, false);
    println!("{}", hexlify(&frame));
}

fn schedule(matches: &ArgMatches) {
    let tr_nom: u32 = parse(matches, "tr");
    let duty_cycle = u32::from_str_radix(matches.get_one::<String>("duty").unwrap(), 16)
        .expect("bad --duty mask");
    let seed: u32 = parse(matches, "seed");
    let jitter = matches.get_flag("jitter");
    let now: i64 = matches
        .get_one::<String>("now")
        .map(|t| t.parse().expect("bad --now"))
        .unwrap_or_else(|| Utc::now().timestamp());

    let config = ArgosConfig {
        tr_nom,
        duty_cycle,
        argos_tx_jitter_en: jitter,
        argos_id: seed,
        ..ArgosConfig::default()
    };
    let mut sched = ArgosTxScheduler::new();
    sched.reset(seed);
    match sched.schedule_duty_cycle(&config, now) {
        Some(relative_ms) => {
            let at = now + (relative_ms / 1000) as i64;
            let dt = Utc.timestamp_opt(at, 0).single().expect("bad schedule");
            println!("next TX in {relative_ms} ms at {dt}");
        },
        None => println!("no transmission instant inside the next 24 hours"),
    }
}

fn parse<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> T
where
    T::Err: std::fmt::Debug,
{
    matches
        .get_one::<String>(name)
        .unwrap_or_else(|| panic!("missing --{name}"))
        .parse()
        .unwrap_or_else(|e| panic!("bad --{name}: {e:?}"))
}
