use http::StatusCode;

use super::error::InvalidOutcome;

/// What a task reports back after a single run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The run went through. Counts toward speeding back up.
    Ok,
    /// The downstream resource signalled congestion; back off.
    RateLimited,
    /// The run failed. Only the next schedule is delayed.
    Failure,
}

impl Outcome {
    pub const fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok)
    }

    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Outcome::RateLimited)
    }

    pub const fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::RateLimited => "rate_limited",
            Outcome::Failure => "failure",
        }
    }

    /// Classifies an HTTP response status.
    ///
    /// `429 Too Many Requests` and `503 Service Unavailable` are rate limits, other
    /// 4xx/5xx statuses are failures, anything else is a success.
    pub fn from_status(status: StatusCode) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            Outcome::RateLimited
        } else if status.is_client_error() || status.is_server_error() {
            Outcome::Failure
        } else {
            Outcome::Ok
        }
    }
}

/// Conversion from whatever a task returns into an [`Outcome`].
///
/// Numeric status codes follow `0 = ok`, `1 = rate limited`, `2 = failure`.
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<Outcome, InvalidOutcome>;
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> Result<Outcome, InvalidOutcome> {
        Ok(self)
    }
}

impl IntoOutcome for StatusCode {
    fn into_outcome(self) -> Result<Outcome, InvalidOutcome> {
        Ok(Outcome::from_status(self))
    }
}

impl IntoOutcome for i64 {
    fn into_outcome(self) -> Result<Outcome, InvalidOutcome> {
        match self {
            0 => Ok(Outcome::Ok),
            1 => Ok(Outcome::RateLimited),
            2 => Ok(Outcome::Failure),
            other => Err(InvalidOutcome::new(other)),
        }
    }
}

impl IntoOutcome for i32 {
    fn into_outcome(self) -> Result<Outcome, InvalidOutcome> {
        i64::from(self).into_outcome()
    }
}

impl IntoOutcome for u8 {
    fn into_outcome(self) -> Result<Outcome, InvalidOutcome> {
        i64::from(self).into_outcome()
    }
}

impl IntoOutcome for &str {
    fn into_outcome(self) -> Result<Outcome, InvalidOutcome> {
        match self {
            "ok" => Ok(Outcome::Ok),
            "rateLimited" | "rate_limited" => Ok(Outcome::RateLimited),
            "failure" => Ok(Outcome::Failure),
            other => Err(InvalidOutcome::new(format!("{other:?}"))),
        }
    }
}

impl IntoOutcome for String {
    fn into_outcome(self) -> Result<Outcome, InvalidOutcome> {
        self.as_str().into_outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_codes() {
        assert_eq!(0u8.into_outcome().unwrap(), Outcome::Ok);
        assert_eq!(1i32.into_outcome().unwrap(), Outcome::RateLimited);
        assert_eq!(2i64.into_outcome().unwrap(), Outcome::Failure);

        let err = 3u8.into_outcome().unwrap_err();
        assert_eq!(err.value(), "3");
        assert_eq!(err.to_string(), "Invalid status code: 3");
        assert!((-1i64).into_outcome().is_err());
    }

    #[test]
    fn names() {
        assert_eq!("ok".into_outcome().unwrap(), Outcome::Ok);
        assert_eq!("rateLimited".into_outcome().unwrap(), Outcome::RateLimited);
        assert_eq!(
            String::from("rate_limited").into_outcome().unwrap(),
            Outcome::RateLimited
        );
        assert_eq!("failure".into_outcome().unwrap(), Outcome::Failure);
        assert!("OK".into_outcome().is_err());
    }

    #[test]
    fn http_statuses() {
        assert_eq!(Outcome::from_status(StatusCode::OK), Outcome::Ok);
        assert_eq!(Outcome::from_status(StatusCode::NOT_MODIFIED), Outcome::Ok);
        assert_eq!(
            Outcome::from_status(StatusCode::TOO_MANY_REQUESTS),
            Outcome::RateLimited
        );
        assert_eq!(
            Outcome::from_status(StatusCode::SERVICE_UNAVAILABLE),
            Outcome::RateLimited
        );
        assert_eq!(Outcome::from_status(StatusCode::NOT_FOUND), Outcome::Failure);
        assert_eq!(
            StatusCode::BAD_GATEWAY.into_outcome().unwrap(),
            Outcome::Failure
        );
    }
}
