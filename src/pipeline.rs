use std::{fs, path::Path};

use super::{
    artifacts::Artifacts,
    config::Config,
    convert::Converter,
    error::{PipelineError, Stage},
    interrupt,
    output::{write_coverage, write_sizes},
    read::{open_inputs, read_input},
    utils::check_writable,
};

/// Tracks the current stage of a run.  Stages are only ever entered in order.
pub struct Pipeline<'a> {
    cfg: &'a Config,
    stage: Stage,
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

impl<'a> Pipeline<'a> {
    pub fn new(cfg: &'a Config) -> Self {
        Self {
            cfg,
            stage: Stage::Init,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn advance(&mut self, next: Stage) {
        assert!(
            next > self.stage,
            "Can not move from stage {} to {}",
            self.stage,
            next
        );
        debug!("Stage {} -> {}", self.stage, next);
        self.stage = next
    }

    /// Checks made before any work is done, so that we fail early rather than after reading
    /// all of the input
    fn init(&self) -> anyhow::Result<Converter> {
        let cfg = self.cfg;
        let conv = Converter::new(cfg.converter());
        conv.check_available()?;

        let out = cfg.bigwig_file();
        for p in cfg.input_files() {
            if same_file(p, out) {
                return Err(anyhow!(
                    "Bad arguments, input and output files are the same: {}",
                    p.display()
                ));
            }
        }
        if let Ok(md) = fs::metadata(out) {
            if md.len() > 0 && !cfg.force() {
                return Err(anyhow!(
                    "Output file {} exists and is not empty (use --force to overwrite)",
                    out.display()
                ));
            }
        }
        check_writable(out, Stage::Init)?;
        if !cfg.use_tempfile() {
            check_writable(&cfg.wig_file(), Stage::Init)?;
            check_writable(&cfg.sizes_file(), Stage::Init)?;
        }
        Ok(conv)
    }

    fn process(&mut self, conv: &Converter, art: &Artifacts) -> anyhow::Result<()> {
        let cfg = self.cfg;

        self.advance(Stage::Reading);
        let (refs, inputs) = open_inputs(cfg)?;
        let acc = read_input(cfg, &refs, inputs)?;
        acc.stats.log();

        self.advance(Stage::Emitting);
        info!("Building wig file: {}", art.wig().display());
        let n = write_coverage(cfg, &refs, acc.profiles, art.wig())?;
        debug!("Wrote {} coverage intervals", n);
        info!("Building sizes file: {}", art.sizes().display());
        write_sizes(&refs, art.sizes())?;

        self.advance(Stage::Converting);
        interrupt::check(Stage::Converting)?;
        info!("Building bigwig file: {}", cfg.bigwig_file().display());
        let res = conv.run(art.wig(), art.sizes(), cfg.bigwig_file());
        // The converter gets the same signals as we do, so report an interrupt as such
        interrupt::check(Stage::Converting)?;
        res?;
        Ok(())
    }
}

/// Run the whole conversion.  Intermediate files are removed at the end (unless they are to be
/// kept) even if an earlier stage failed.
pub fn run(cfg: &Config) -> anyhow::Result<()> {
    let mut pl = Pipeline::new(cfg);
    let conv = pl.init()?;
    let mut art = Artifacts::new(cfg)?;

    let res = pl.process(&conv, &art);
    if let Err(e) = &res {
        debug!("Failed at stage {}: {}", pl.stage(), e)
    }

    pl.advance(Stage::Cleanup);
    let cleaned = art.cleanup();
    res?;
    cleaned?;

    pl.advance(Stage::Done);
    info!("Done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::tests::config_from_args,
        convert::tests::{fake_converter, script},
        error::exit_code,
        interrupt::tests::interrupt_current_thread,
        read::tests::{sam_rec, write_sam},
    };

    #[test]
    fn end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let conv = fake_converter(dir.path());
        let sq = [("chr1", 1000), ("chr2", 200)];
        let a = write_sam(
            dir.path(),
            "s.sam",
            &sq,
            &[
                &sam_rec("r1", 0, "chr2", 1, "5M", 5),
                &sam_rec("r2", 0, "chr2", 4, "5M", 5),
                &sam_rec("r3", 0x400, "chr1", 1, "5M", 5),
            ],
        );
        let cfg = config_from_args(&[
            "--converter",
            conv.to_str().unwrap(),
            "-j",
            "2",
            a.to_str().unwrap(),
        ]);
        run(&cfg).unwrap();

        let bw = dir.path().join("s.bigwig");
        assert_eq!(
            fs::read_to_string(bw).unwrap(),
            "chr1\t0\t5\t1\nchr2\t0\t3\t1\nchr2\t3\t5\t2\nchr2\t5\t8\t1\n"
        );
        assert!(!dir.path().join("s.wig").exists());
        assert!(!dir.path().join("s.sizes").exists());
    }

    #[test]
    fn keep_intermediate_files() {
        let dir = tempfile::tempdir().unwrap();
        let conv = fake_converter(dir.path());
        let a = write_sam(
            dir.path(),
            "s.sam",
            &[("chr1", 100)],
            &[&sam_rec("r1", 0, "chr1", 11, "10M", 10)],
        );
        let cfg = config_from_args(&[
            "--converter",
            conv.to_str().unwrap(),
            "-k",
            a.to_str().unwrap(),
        ]);
        run(&cfg).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("s.wig")).unwrap(),
            "chr1\t10\t20\t1\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("s.sizes")).unwrap(),
            "chr1\t100\n"
        );
    }

    #[test]
    fn converter_failure_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let conv = script(dir.path(), "broken", "exit 3");
        let a = write_sam(
            dir.path(),
            "s.sam",
            &[("chr1", 100)],
            &[&sam_rec("r1", 0, "chr1", 11, "10M", 10)],
        );
        let cfg = config_from_args(&["--converter", conv.to_str().unwrap(), a.to_str().unwrap()]);
        let e = run(&cfg).unwrap_err();
        assert_eq!(exit_code(&e), 4);
        assert!(!dir.path().join("s.wig").exists());
        assert!(!dir.path().join("s.sizes").exists());
    }

    #[test]
    fn strict_mode_reports_malformed_record() {
        let dir = tempfile::tempdir().unwrap();
        let conv = fake_converter(dir.path());
        // Enough records to fill every block in flight with one process thread, with the record
        // running off the end of chr1 in the third block
        let mut recs: Vec<String> = (0..1300)
            .map(|i| sam_rec(&format!("r{}", i), 0, "chr1", 1, "5M", 5))
            .collect();
        recs[600] = sam_rec("bad", 0, "chr1", 995, "10M", 10);
        let recs: Vec<&str> = recs.iter().map(|s| s.as_str()).collect();
        let a = write_sam(dir.path(), "s.sam", &[("chr1", 1000)], &recs);

        let cfg = config_from_args(&[
            "--converter",
            conv.to_str().unwrap(),
            "--strict",
            "-j",
            "1",
            a.to_str().unwrap(),
        ]);
        let e = run(&cfg).unwrap_err();
        assert_eq!(exit_code(&e), 3, "{:#}", e);
        assert!(!dir.path().join("s.bigwig").exists());

        // Without --strict the record is skipped
        let cfg = config_from_args(&["--converter", conv.to_str().unwrap(), "-j", "1", a.to_str().unwrap()]);
        run(&cfg).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("s.bigwig")).unwrap(),
            "chr1\t0\t5\t1299\n"
        );
    }

    #[test]
    fn interrupt_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let conv = fake_converter(dir.path());
        let a = write_sam(
            dir.path(),
            "s.sam",
            &[("chr1", 100)],
            &[&sam_rec("r1", 0, "chr1", 11, "10M", 10)],
        );
        // Left over from an earlier run
        let wig = dir.path().join("s.wig");
        let sizes = dir.path().join("s.sizes");
        fs::write(&wig, "chr1\t0\t1\t1\n").unwrap();
        fs::write(&sizes, "chr1\t100\n").unwrap();

        let cfg = config_from_args(&["--converter", conv.to_str().unwrap(), a.to_str().unwrap()]);
        interrupt_current_thread(true);
        let res = run(&cfg);
        interrupt_current_thread(false);

        let e = res.unwrap_err();
        assert_eq!(exit_code(&e), 130);
        assert!(!wig.exists() && !sizes.exists());
        assert!(!dir.path().join("s.bigwig").exists());
    }

    #[test]
    fn missing_input_fails_after_init() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.bam");
        let cfg = config_from_args(&["--converter", "true", missing.to_str().unwrap()]);
        let e = run(&cfg).unwrap_err();
        assert_eq!(exit_code(&e), 2);
    }

    #[test]
    fn existing_output_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_sam(dir.path(), "s.sam", &[("chr1", 100)], &[]);
        let bw = dir.path().join("s.bigwig");
        fs::write(&bw, "old").unwrap();
        let cfg = config_from_args(&["--converter", "true", a.to_str().unwrap()]);
        let e = run(&cfg).unwrap_err();
        assert_eq!(exit_code(&e), 1);
        assert_eq!(fs::read_to_string(&bw).unwrap(), "old");

        // Output is the same as the input
        let cfg = config_from_args(&[
            "--converter",
            "true",
            "-f",
            "-o",
            a.to_str().unwrap(),
            a.to_str().unwrap(),
        ]);
        assert_eq!(exit_code(&run(&cfg).unwrap_err()), 1);
    }

    #[test]
    fn missing_converter() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_sam(dir.path(), "s.sam", &[("chr1", 100)], &[]);
        let cfg = config_from_args(&["--converter", "no-such-converter-exists", a.to_str().unwrap()]);
        assert_eq!(exit_code(&run(&cfg).unwrap_err()), 4);
    }

    #[test]
    #[should_panic]
    fn stages_only_move_forward() {
        let cfg = config_from_args(&["x.bam"]);
        let mut pl = Pipeline::new(&cfg);
        pl.advance(Stage::Emitting);
        pl.advance(Stage::Reading);
    }
}
