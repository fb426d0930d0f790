// [apps/probe-cli/src/main.rs]
/*!
 * =================================================================
 * APARATO: SONDA CGMINER DE LÍNEA DE COMANDOS (V1.0)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: PRUEBA DE CONECTIVIDAD SEGURA, SIN PERSISTENCIA
 *
 * Puerto directo de `original_source/tools/cgminer_probe.py`: mismos
 * modos (`--json`/`--quiet`/`--normalized`/`--cmd all`), mismos códigos
 * de salida (spec §6): 0 OK, 1 fallo de conexión, 2 error de
 * parseo/validación, 3 cualquier otro fallo. No habla con el plano de
 * control ni toca credenciales de cloud -- sólo el firmware CGMiner.
 * =================================================================
 */

use clap::{Parser, ValueEnum};
use fleetctl_core_miner_proto::{
    get_normalized_telemetry, quick_probe, MinerProtoClient, MinerProtoError,
};

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum ProbeCommand {
    Summary,
    Stats,
    Pools,
    Devs,
    Version,
    All,
}

impl ProbeCommand {
    fn as_str(self) -> &'static str {
        match self {
            ProbeCommand::Summary => "summary",
            ProbeCommand::Stats => "stats",
            ProbeCommand::Pools => "pools",
            ProbeCommand::Devs => "devs",
            ProbeCommand::Version => "version",
            ProbeCommand::All => "all",
        }
    }
}

/// Sonda de conectividad CGMiner -- no registra credenciales, no persiste nada.
#[derive(Debug, Parser)]
#[command(name = "probe-cli", about = "CGMiner API Probe Tool - Safe connectivity testing")]
struct Args {
    /// Dirección IP o hostname del miner.
    #[arg(long = "host", short = 'H')]
    host: String,

    /// Puerto de la API CGMiner.
    #[arg(long, short = 'p', default_value_t = fleetctl_core_miner_proto::DEFAULT_PORT)]
    port: u16,

    /// Comando a ejecutar.
    #[arg(long = "cmd", short = 'c', value_enum, default_value_t = ProbeCommand::Summary)]
    cmd: ProbeCommand,

    /// Timeout en segundos.
    #[arg(long, short = 't', default_value_t = 5)]
    timeout: u64,

    /// Salida en formato JSON.
    #[arg(long, short = 'j')]
    json: bool,

    /// Salida de telemetría normalizada.
    #[arg(long, short = 'n')]
    normalized: bool,

    /// Modo silencioso: sólo imprime la línea de resultado.
    #[arg(long, short = 'q')]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.quiet || args.json {
        let result = quick_probe(&args.host, args.port, args.timeout).await;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&result).unwrap());
        } else {
            println!(
                "{} | {:.1}ms | {:.2} GH/s | {:.1}C | {}",
                result.result, result.latency_ms, result.hashrate_ghs, result.temp_max_c, result.as_of
            );
        }

        std::process::exit(if result.result == "OK" { 0 } else { 1 });
    }

    println!("\n{}", "=".repeat(60));
    println!("CGMiner Probe: {}:{}", args.host, args.port);
    println!("{}", "=".repeat(60));

    let mut client = match MinerProtoClient::with_options(&args.host, args.port, args.timeout, 3, false) {
        Ok(client) => client,
        Err(err) => return fail(&err),
    };

    if args.normalized {
        println!("\n[Normalized Telemetry]");
        let telemetry = get_normalized_telemetry(&mut client).await;
        println!("{}", serde_json::to_string_pretty(&telemetry).unwrap());
        let ok = telemetry.status == fleetctl_core_miner_proto::MinerOnlineStatus::Online;
        println!("\nResult: {}", if ok { "OK" } else { "FAIL" });
        std::process::exit(if ok { 0 } else { 1 });
    }

    let commands: Vec<ProbeCommand> = if args.cmd == ProbeCommand::All {
        vec![ProbeCommand::Summary, ProbeCommand::Stats, ProbeCommand::Pools, ProbeCommand::Devs, ProbeCommand::Version]
    } else {
        vec![args.cmd]
    };

    for command in commands {
        println!("\n[{}]", command.as_str().to_uppercase());
        match client.send_command(command.as_str(), "").await {
            Ok(value) => {
                println!("{}", serde_json::to_string_pretty(&value).unwrap());
                println!("  Latency: {:.1}ms", client.last_latency_ms());
            }
            Err(err) => println!("  Error: {err}"),
        }
    }

    println!("\n{}", "=".repeat(60));
    println!(
        "Result: OK | Latency: {:.1}ms | As of: {}",
        client.last_latency_ms(),
        client.last_response_time().map(|t| t.to_rfc3339()).unwrap_or_default()
    );
    println!("{}\n", "=".repeat(60));
}

fn fail(err: &MinerProtoError) -> ! {
    let exit_code = match err {
        MinerProtoError::Timeout { .. } | MinerProtoError::Connection(_) | MinerProtoError::Dns(_) => 1,
        MinerProtoError::Validation(_) => 2,
        MinerProtoError::Parse { .. } => 2,
        MinerProtoError::Unknown(_) => 3,
    };
    println!("\n[ERROR] {}: {err}", err.error_type());
    println!("\nResult: FAIL\n");
    std::process::exit(exit_code);
}
