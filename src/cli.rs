use std::{num::NonZeroUsize, path::PathBuf};

use clap::{command, value_parser, Arg, ArgAction, Command};

use super::utils::LogLevel;

pub fn cli_model() -> Command {
    command!()
        .arg(
            Arg::new("timestamp")
                .short('X')
                .long("timestamp")
                .value_parser(value_parser!(stderrlog::Timestamp))
                .value_name("GRANULARITY")
                .default_value("none")
                .help("Prepend log entries with a timestamp"),
        )
        .arg(
            Arg::new("loglevel")
                .short('l')
                .long("loglevel")
                .value_name("LOGLEVEL")
                .value_parser(value_parser!(LogLevel))
                .ignore_case(true)
                .default_value("info")
                .help("Set log level"),
        )
        .arg(
            Arg::new("quiet")
                .action(ArgAction::SetTrue)
                .long("quiet")
                .conflicts_with("loglevel")
                .help("Silence all output"),
        )
        .arg(
            Arg::new("threads")
                .short('j')
                .long("threads")
                .value_parser(value_parser!(NonZeroUsize))
                .value_name("INT")
                .help("Set number of threads [default: available cores]"),
        )
        .arg(
            Arg::new("bigwig")
                .short('o')
                .long("bigwig_filename")
                .value_parser(value_parser!(PathBuf))
                .value_name("OUTPUT_FILE")
                .help("Output bigWig file [default: <first input prefix>.bigwig]"),
        )
        .arg(
            Arg::new("tempfile")
                .action(ArgAction::SetTrue)
                .short('t')
                .long("tempfile")
                .help("Use unique temporary names for the intermediate wig and sizes files"),
        )
        .arg(
            Arg::new("keep_tempfile")
                .action(ArgAction::SetTrue)
                .short('k')
                .long("keep-tempfile")
                .visible_alias("keeptemp")
                .help("Do not delete the intermediate wig and sizes files"),
        )
        .arg(
            Arg::new("ignore_secondary")
                .action(ArgAction::SetTrue)
                .short('s')
                .long("ignore-secondary")
                .help("Ignore alignments with the secondary alignment flag (0x100) set"),
        )
        .arg(
            Arg::new("ignore_qc_fail")
                .action(ArgAction::SetTrue)
                .short('q')
                .long("ignore-qc-fail")
                .help("Ignore alignments with the QC fail flag (0x200) set"),
        )
        .arg(
            Arg::new("ignore_duplicate")
                .action(ArgAction::SetTrue)
                .short('d')
                .long("ignore-optical-pcr-duplicate")
                .help("Ignore alignments with the PCR or optical duplicate flag (0x400) set"),
        )
        .arg(
            Arg::new("ignore_supplementary")
                .action(ArgAction::SetTrue)
                .short('u')
                .long("ignore-supplementary")
                .help("Ignore alignments with the supplementary alignment flag (0x800) set"),
        )
        .arg(
            Arg::new("strict")
                .action(ArgAction::SetTrue)
                .long("strict")
                .help("Abort on malformed records instead of skipping them"),
        )
        .arg(
            Arg::new("force")
                .action(ArgAction::SetTrue)
                .short('f')
                .long("force")
                .help("Overwrite an existing non-empty output file"),
        )
        .arg(
            Arg::new("converter")
                .long("converter")
                .value_parser(value_parser!(String))
                .value_name("PROGRAM")
                .default_value("wigToBigWig")
                .help("Program used to convert the wig and sizes files to bigWig"),
        )
        .arg(
            Arg::new("input")
                .value_parser(value_parser!(PathBuf))
                .value_name("INPUT_FILE")
                .action(ArgAction::Append)
                .required(true)
                .num_args(1..)
                .help("Input SAM/BAM/CRAM file(s); coverage from all files is combined"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_is_consistent() {
        cli_model().debug_assert()
    }

    #[test]
    fn long_and_short_option_names() {
        let m = cli_model()
            .try_get_matches_from([
                "bam2bigwig",
                "--bigwig_filename",
                "out.bw",
                "--keeptemp",
                "-sqdu",
                "a.bam",
                "b.bam",
            ])
            .unwrap();
        assert_eq!(
            m.get_one::<PathBuf>("bigwig"),
            Some(&PathBuf::from("out.bw"))
        );
        assert!(m.get_flag("keep_tempfile"));
        assert!(m.get_flag("ignore_secondary") && m.get_flag("ignore_supplementary"));
        let v: Vec<_> = m.get_many::<PathBuf>("input").unwrap().collect();
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn input_required() {
        assert!(cli_model().try_get_matches_from(["bam2bigwig", "-t"]).is_err());
    }
}
