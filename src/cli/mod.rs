pub mod actions;
pub mod config;
pub mod handlers;
pub mod modbus;
pub mod watch;

use clap::{Arg, ArgMatches, Command};

/// Build the command line definition.
pub fn build_command() -> Command {
    Command::new("hrsim")
        .about("Serve a CSV register map as read-only Modbus RTU holding registers")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Load settings from a JSON or TOML file")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .help("Serial port name (default: $MODBUS_PORT or COM3)")
                .value_name("PORT"),
        )
        .arg(
            Arg::new("baud")
                .long("baud")
                .help("Serial port baud rate (default: $MODBUS_BAUD or 9600)")
                .value_name("BAUD")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("bytesize")
                .long("bytesize")
                .help("Data bits")
                .value_name("BITS")
                .value_parser(clap::value_parser!(u8).range(5..=8)),
        )
        .arg(
            Arg::new("parity")
                .long("parity")
                .help("Parity: N, E or O")
                .value_name("PARITY")
                .value_parser(["N", "E", "O"])
                .ignore_case(true),
        )
        .arg(
            Arg::new("stopbits")
                .long("stopbits")
                .help("Stop bits")
                .value_name("BITS")
                .value_parser(clap::value_parser!(u8).range(1..=2)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("Serial read timeout in seconds")
                .value_name("SECS")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("slave")
                .long("slave")
                .short('s')
                .help("Modbus station id to answer as")
                .value_name("ID")
                .value_parser(clap::value_parser!(u8).range(1..=247)),
        )
        .arg(
            Arg::new("csv")
                .long("csv")
                .help("Register map CSV file")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("four-base")
                .long("four-base")
                .help("Register number that maps to index 0 for 4xxxx references")
                .value_name("BASE")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("order")
                .long("order")
                .help("Default order code: ABCD, BADC, CDAB or DCBA")
                .value_name("CODE"),
        )
        .arg(
            Arg::new("byte-order")
                .long("byte-order")
                .help("Default byte order within a word: big or little")
                .value_name("ORDER"),
        )
        .arg(
            Arg::new("word-order")
                .long("word-order")
                .help("Default word order for 32-bit values: big or little")
                .value_name("ORDER"),
        )
        .arg(
            Arg::new("strict-gaps")
                .long("strict-gaps")
                .help("Answer reads touching unmapped registers with an illegal address exception")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-reads")
                .long("log-reads")
                .help("Log every served read")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("fail-fast")
                .long("fail-fast")
                .help("Stop compiling at the first bad row")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("watch")
                .long("watch")
                .short('w')
                .help("Reload the map when the CSV file changes")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log")
                .long("log")
                .help("Log level: DEBUG, INFO, WARNING or ERROR")
                .value_name("LEVEL")
                .default_value("INFO"),
        )
        .arg(
            Arg::new("preview")
                .long("preview")
                .help("Compile the map, print every register and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .short('j')
                .help("Print results and events as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list-ports")
                .long("list-ports")
                .short('l')
                .help("List all available serial ports and exit")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with("preview"),
        )
}

/// Parse command line arguments and return ArgMatches.
pub fn parse_args() -> ArgMatches {
    build_command().get_matches()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_definition_is_consistent() {
        build_command().debug_assert();
    }

    #[test]
    fn test_flags_parse() {
        let matches = build_command()
            .try_get_matches_from([
                "hrsim",
                "--port",
                "/dev/ttyUSB0",
                "--baud",
                "19200",
                "--parity",
                "e",
                "--slave",
                "3",
                "--order",
                "CDAB",
                "--strict-gaps",
            ])
            .unwrap();
        assert_eq!(
            matches.get_one::<String>("port").map(String::as_str),
            Some("/dev/ttyUSB0")
        );
        assert_eq!(matches.get_one::<u32>("baud"), Some(&19200));
        assert_eq!(matches.get_one::<u8>("slave"), Some(&3));
        assert!(matches.get_flag("strict-gaps"));
        assert!(!matches.get_flag("watch"));
        assert_eq!(
            matches.get_one::<String>("log").map(String::as_str),
            Some("INFO")
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(build_command()
            .try_get_matches_from(["hrsim", "--stopbits", "3"])
            .is_err());
        assert!(build_command()
            .try_get_matches_from(["hrsim", "--slave", "0"])
            .is_err());
        assert!(build_command()
            .try_get_matches_from(["hrsim", "--preview", "--list-ports"])
            .is_err());
    }
}
