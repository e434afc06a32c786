use lumoport::active_cpu_count;
use lumoport::constants::NCPUS_OVERRIDE_VAR;

// The override is read once per process, so this binary holds one test
#[test]
fn test_override_wins_and_is_cached() {
    std::env::set_var(NCPUS_OVERRIDE_VAR, "3");
    assert_eq!(active_cpu_count(), 3);

    std::env::set_var(NCPUS_OVERRIDE_VAR, "17");
    assert_eq!(active_cpu_count(), 3);
    std::env::remove_var(NCPUS_OVERRIDE_VAR);
    assert_eq!(active_cpu_count(), 3);
}
