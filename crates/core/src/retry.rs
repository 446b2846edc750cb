use crate::{RetryPolicy, ServiceError};
use std::time::Duration;

/// Run `call`, retrying transient failures according to `policy` with
/// `std::thread::sleep` between attempts. Non-transient errors return
/// immediately; a transient error on the final attempt is returned as-is.
pub fn retry_call<T, F>(policy: &RetryPolicy, call: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Result<T, ServiceError>,
{
    retry_call_with(policy, call, std::thread::sleep)
}

/// Same as [`retry_call`] but with an injectable sleeper.
pub fn retry_call_with<T, F, S>(
    policy: &RetryPolicy,
    mut call: F,
    mut sleep: S,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Result<T, ServiceError>,
    S: FnMut(Duration),
{
    let delays = policy.delays();
    let mut attempt = 0usize;
    loop {
        match call() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < delays.len() => {
                tracing::warn!(attempt = attempt + 1, error = %e, "retrying transient failure");
                sleep(delays[attempt]);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn transient() -> ServiceError {
        ServiceError::Transient {
            code: "ThrottlingException".into(),
            message: "slow down".into(),
        }
    }

    #[test]
    fn delay_schedule_grows_and_caps() {
        let policy = RetryPolicy::default();
        let delays = policy.delays();
        assert_eq!(delays.len(), 4);
        assert_eq!(delays[0], Duration::from_secs_f64(5.0));
        assert_eq!(delays[1], Duration::from_secs_f64(12.5));
        assert_eq!(delays[2], Duration::from_secs_f64(23.75));
        assert_eq!(delays[3], Duration::from_secs_f64(40.625));

        let tight = RetryPolicy {
            max_delay: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        assert!(tight.delays().iter().all(|d| *d <= Duration::from_secs(10)));
    }

    #[test]
    fn succeeds_after_two_transient_failures() {
        let calls = Cell::new(0u32);
        let out = retry_call_with(
            &RetryPolicy::default(),
            || {
                calls.set(calls.get() + 1);
                if calls.get() <= 2 {
                    Err(transient())
                } else {
                    Ok("validated")
                }
            },
            |_| {},
        );
        assert_eq!(out.unwrap(), "validated");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn non_transient_error_is_not_retried() {
        let calls = Cell::new(0u32);
        let out: Result<(), _> = retry_call_with(
            &RetryPolicy::default(),
            || {
                calls.set(calls.get() + 1);
                Err(ServiceError::Internal("boom".into()))
            },
            |_| {},
        );
        assert!(matches!(out, Err(ServiceError::Internal(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn gives_up_after_configured_tries() {
        let calls = Cell::new(0u32);
        let slept = Cell::new(0u32);
        let out: Result<(), _> = retry_call_with(
            &RetryPolicy::default(),
            || {
                calls.set(calls.get() + 1);
                Err(transient())
            },
            |_| slept.set(slept.get() + 1),
        );
        assert!(matches!(out, Err(ServiceError::Transient { .. })));
        assert_eq!(calls.get(), 5);
        assert_eq!(slept.get(), 4);
    }
}
