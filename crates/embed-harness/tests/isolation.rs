use embed_harness::scenario::ScenarioStatus;
use embed_harness::{
    builtin_scenarios, run_all, run_scenario, Availability, HarnessError, HostPlatform,
    PlatformTable, Session,
};


use fake_runner::{config_in, exit, generator_reporting, FakeRunner};

fn linux() -> &'static PlatformTable {
    PlatformTable::for_platform(HostPlatform::Linux)
}

fn session_with(
    work: &std::path::Path,
    runner: &FakeRunner,
    availability: Availability,
) -> Session {
    Session::new(config_in(work, linux()), linux(), Box::new(runner.clone()))
        .with_availability(availability)
}

#[test]
fn scenarios_get_distinct_directories() {
    let work = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner::new(generator_reporting("_cffi.so"));
    let mut session = session_with(work.path(), &runner, Availability::Available);

    let a = session.begin("a").expect("begin a").dir().to_path_buf();
    let b = session.begin("b").expect("begin b").dir().to_path_buf();

    assert_ne!(a, b);
    assert!(a.is_dir());
    assert!(b.is_dir());
    let session_dir = session.session_dir().expect("session dir");
    assert!(session_dir.starts_with(work.path()));
    assert_eq!(a, session_dir.join("embedding").join("a"));
}

#[test]
fn sessions_sharing_a_work_root_never_share_directories() {
    let work = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner::new(generator_reporting("_cffi.so"));
    let mut first = session_with(work.path(), &runner, Availability::Available);
    let mut second = session_with(work.path(), &runner, Availability::Available);

    let d1 = first.begin("basic").expect("begin first").dir().to_path_buf();
    std::fs::write(d1.join("add1-test"), b"stale").expect("leave stale exe");
    let d2 = second.begin("basic").expect("begin second").dir().to_path_buf();

    assert_ne!(d1, d2);
    assert_ne!(
        first.session_dir().expect("first dir"),
        second.session_dir().expect("second dir")
    );
    assert!(!d2.join("add1-test").exists());
    assert_eq!(std::fs::read_dir(&d2).expect("read second").count(), 0);
}

#[test]
fn claiming_a_name_twice_is_rejected() {
    let work = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner::new(generator_reporting("_cffi.so"));
    let mut session = session_with(work.path(), &runner, Availability::Available);

    session.begin("dup").expect("first begin");
    let err = session.begin("dup").err().expect("second begin fails");
    assert!(
        matches!(
            err.downcast_ref::<HarnessError>(),
            Some(HarnessError::DirectoryClaimed { name }) if name == "dup"
        ),
        "err={err:#}"
    );
}

#[test]
fn scenario_names_must_be_a_single_path_component() {
    let work = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner::new(generator_reporting("_cffi.so"));
    let mut session = session_with(work.path(), &runner, Availability::Available);

    for bad in ["", "..", "a/b", "/abs"] {
        let err = session.begin(bad).err().expect("invalid name");
        assert!(
            matches!(
                err.downcast_ref::<HarnessError>(),
                Some(HarnessError::InvalidScenarioName { .. })
            ),
            "name={bad:?} err={err:#}"
        );
    }
}

#[test]
fn unavailable_environment_skips_without_running_anything() {
    let work = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner::new(generator_reporting("_cffi.so"));
    let mut session = session_with(
        work.path(),
        &runner,
        Availability::Unavailable {
            reason: "no C compiler".to_string(),
        },
    );

    let err = session.begin("basic").err().expect("begin fails");
    let harness = err.downcast_ref::<HarnessError>().expect("harness error");
    assert!(harness.is_skip());

    let specs = builtin_scenarios();
    let report = run_scenario(&mut session, &specs[0]);
    assert_eq!(report.status, ScenarioStatus::Skip);
    assert_eq!(report.error_kind, Some("unavailable"));
    assert!(report
        .detail
        .as_deref()
        .is_some_and(|d| d.contains("no C compiler")));
    assert!(runner.calls().is_empty());
}

#[test]
fn run_all_counts_skips_as_ok() {
    let work = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner::new(generator_reporting("_cffi.so"));
    let mut session = session_with(
        work.path(),
        &runner,
        Availability::Unavailable {
            reason: "generator missing".to_string(),
        },
    );

    let report = run_all(&mut session, &builtin_scenarios());
    assert!(report.ok);
    assert_eq!(report.summary.skipped, 2);
    assert_eq!(report.summary.passed, 0);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.platform, "linux");

    let json = serde_json::to_value(&report).expect("serialize report");
    assert_eq!(json["environment"]["status"], "unavailable");
    assert_eq!(json["scenarios"][0]["status"], "skip");
}

#[test]
fn generation_failures_fail_the_run() {
    let work = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner::new(|_| exit(1, "ModuleNotFoundError: cffi\n"));
    let mut session = session_with(work.path(), &runner, Availability::Available);

    let report = run_all(&mut session, &builtin_scenarios());
    assert!(!report.ok);
    assert_eq!(report.summary.failed, 2);
    for scenario in &report.scenarios {
        assert_eq!(scenario.status, ScenarioStatus::Fail);
        assert_eq!(scenario.error_kind, Some("generation"));
        assert!(scenario.dir.is_some());
    }
}

#[cfg(unix)]
#[test]
fn environment_is_probed_once_per_session() {
    let work = tempfile::tempdir().expect("tempdir");
    let runner = FakeRunner::new(|_| exit(1, "No module named 'cffi'\n"));
    let mut cfg = config_in(work.path(), linux());
    cfg.toolchain.cc = "sh".into();
    let mut session = Session::new(cfg, linux(), Box::new(runner.clone()));

    for name in ["first", "second"] {
        let err = session.begin(name).err().expect("unavailable");
        assert_eq!(embed_harness::error::error_kind(&err), "unavailable");
        assert!(format!("{err:#}").contains("No module named 'cffi'"), "err={err:#}");
    }
    let probes = runner.calls_to("fake-python");
    assert_eq!(probes.len(), 1);
    assert!(probes[0].args[0].to_string_lossy().ends_with("probe.py"));
}

#[test]
fn binding_digests_follow_the_library_file() {
    let specs = builtin_scenarios();
    for writes_library in [true, false] {
        let work = tempfile::tempdir().expect("tempdir");
        let report_library = generator_reporting("_cffi.so");
        let runner = FakeRunner::new(move |spec: &embed_harness::CommandSpec| {
            let out = report_library(spec);
            if writes_library && spec.program == "fake-python" {
                let stem = fake_runner::script_stem(spec).unwrap_or_default();
                std::fs::write(spec.cwd.join(format!("_{stem}_cffi.so")), b"\x7fELF")
                    .expect("write library");
            }
            out
        });
        let mut session = session_with(work.path(), &runner, Availability::Available);

        let report = run_scenario(&mut session, &specs[0]);
        // The fake linker never produces an executable.
        assert_eq!(report.status, ScenarioStatus::Fail);
        assert_eq!(report.bindings.len(), 1);
        let digest = report.bindings[0].sha256.as_deref();
        if writes_library {
            let digest = digest.expect("digest of written library");
            assert_eq!(digest.len(), 64);
            assert!(digest.bytes().all(|b| b.is_ascii_hexdigit()));
        } else {
            assert_eq!(digest, None);
        }
    }
}
