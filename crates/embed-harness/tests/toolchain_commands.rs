use std::ffi::OsString;
use std::path::PathBuf;

use embed_harness::{
    Availability, BuildOptions, CommandSpec, HarnessError, HostPlatform, PlatformTable,
    ProcOutput, Session,
};


use fake_runner::{config_in, exit, generator_reporting, ok_stdout, FakeRunner};

fn linux() -> &'static PlatformTable {
    PlatformTable::for_platform(HostPlatform::Linux)
}

fn output_arg(spec: &CommandSpec) -> Option<PathBuf> {
    let pos = spec.args.iter().position(|a| a == "-o")?;
    spec.args.get(pos + 1).map(PathBuf::from)
}

/// Generator and compiler succeed; the linker creates the file named by `-o`.
fn toolchain_ok(spec: &CommandSpec) -> ProcOutput {
    match spec.program.to_str() {
        Some("fake-python") => generator_reporting("_cffi.so")(spec),
        Some("fake-ld") => {
            if let Some(exe) = output_arg(spec) {
                std::fs::write(spec.cwd.join(exe), b"").expect("write fake exe");
            }
            ok_stdout("")
        }
        _ => ok_stdout(""),
    }
}

fn args_of(spec: &CommandSpec) -> Vec<String> {
    spec.args
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

fn fake_session(work: &std::path::Path, runner: &FakeRunner) -> Session {
    Session::new(config_in(work, linux()), linux(), Box::new(runner.clone()))
        .with_availability(Availability::Available)
}

#[test]
fn compile_and_link_commands_follow_the_options() {
    let work = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner::new(toolchain_ok);
    let mut session = fake_session(work.path(), &runner);
    let mut s = session.begin("opts").expect("begin");

    let lib = s.prepare_module("add1").expect("add1");
    let options = BuildOptions {
        optimize: true,
        threads: true,
        ..BuildOptions::default()
    }
    .define("ZED", Some("1"))
    .define("ALPHA", None);
    let exe = s.compile("add1-test", &[lib.clone()], &options).expect("compile");

    assert_eq!(exe, s.dir().join("add1-test"));
    assert_eq!(s.executable(), Some(exe.as_path()));

    let cc = runner.calls_to("fake-cc");
    assert_eq!(cc.len(), 1);
    assert_eq!(cc[0].cwd, s.dir());
    assert_eq!(
        args_of(&cc[0]),
        vec![
            "-c",
            "-g",
            "-O2",
            "-pthread",
            "-DALPHA",
            "-DZED=1",
            "add1-test.c",
            "-o",
            "add1-test.o",
        ]
    );

    let ld = runner.calls_to("fake-ld");
    assert_eq!(ld.len(), 1);
    let lib = lib.display().to_string();
    let exe = exe.display().to_string();
    assert_eq!(
        args_of(&ld[0]),
        vec!["-pthread", "add1-test.o", lib.as_str(), "-o", exe.as_str()]
    );
}

#[test]
fn driver_source_and_header_are_staged() {
    let work = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner::new(toolchain_ok);
    let mut session = fake_session(work.path(), &runner);
    let mut s = session.begin("staged").expect("begin");

    s.compile("add1-test", &[], &BuildOptions::default())
        .expect("compile");

    assert!(s.dir().join("add1-test.c").is_file());
    assert!(s.dir().join("thread-test.h").is_file());
}

#[test]
fn debug_info_without_optimization() {
    let work = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner::new(toolchain_ok);
    let mut session = fake_session(work.path(), &runner);
    let mut s = session.begin("plain").expect("begin");

    s.compile("add1-test", &[], &BuildOptions::default())
        .expect("compile");

    let args = args_of(&runner.calls_to("fake-cc")[0]);
    assert!(args.contains(&"-g".to_string()));
    assert!(!args.contains(&"-O2".to_string()));
    assert!(!args.contains(&"-pthread".to_string()));
}

#[test]
fn link_failure_carries_the_linker_output() {
    let work = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner::new(|spec: &CommandSpec| match spec.program.to_str() {
        Some("fake-ld") => exit(1, "undefined reference to `add1'\n"),
        _ => ok_stdout(""),
    });
    let mut session = fake_session(work.path(), &runner);
    let mut s = session.begin("link_fails").expect("begin");

    let err = s
        .compile("add1-test", &[], &BuildOptions::default())
        .expect_err("link fails");
    match err.downcast_ref::<HarnessError>() {
        Some(HarnessError::Toolchain {
            step,
            exit_code,
            stderr,
            command,
        }) => {
            assert_eq!(*step, "link");
            assert_eq!(*exit_code, 1);
            assert_eq!(stderr, "undefined reference to `add1'\n");
            assert!(command.starts_with("fake-ld "), "command={command}");
        }
        other => panic!("unexpected error: {other:?} ({err:#})"),
    }
    assert!(s.executable().is_none());
}

#[test]
fn missing_driver_source_is_reported() {
    let work = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner::new(toolchain_ok);
    let mut session = fake_session(work.path(), &runner);
    let mut s = session.begin("no_driver").expect("begin");

    let err = s
        .compile("no-such-test", &[], &BuildOptions::default())
        .expect_err("missing source");
    assert!(err.to_string().contains("missing fixture"), "err={err:#}");
    assert!(runner.calls().is_empty());
}

#[test]
fn linker_success_without_output_is_an_error() {
    let work = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner::new(|_| ok_stdout(""));
    let mut session = fake_session(work.path(), &runner);
    let mut s = session.begin("no_output").expect("begin");

    let err = s
        .compile("add1-test", &[], &BuildOptions::default())
        .expect_err("no executable");
    assert!(format!("{err:#}").contains("produced no"), "err={err:#}");
}

#[test]
fn extra_link_args_come_before_the_output() {
    let work = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner::new(toolchain_ok);
    let mut cfg = config_in(work.path(), linux());
    cfg.toolchain.extra_link_args = vec!["-lm".to_string()];
    let mut session = Session::new(cfg, linux(), Box::new(runner.clone()))
        .with_availability(Availability::Available);
    let mut s = session.begin("extra").expect("begin");

    s.compile("add1-test", &[], &BuildOptions::default())
        .expect("compile");

    let args: Vec<OsString> = runner.calls_to("fake-ld")[0].args.clone();
    let lm = args.iter().position(|a| a == "-lm").expect("-lm present");
    let out = args.iter().position(|a| a == "-o").expect("-o present");
    assert!(lm < out);
}
