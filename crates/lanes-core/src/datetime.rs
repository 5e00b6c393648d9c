use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Duration,
  Local,
  NaiveDate,
  NaiveDateTime,
  SecondsFormat,
  TimeZone,
  Utc
};

const NAIVE_FORMATS: [&str; 2] = [
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S%.f"
];

/// Parses a backend timestamp.
///
/// The API emits RFC 3339 with an
/// offset for some fields and naive
/// ISO 8601 for others; naive values
/// are taken as UTC.
pub fn parse_timestamp(
  raw: &str
) -> anyhow::Result<DateTime<Utc>> {
  let raw = raw.trim();
  if let Ok(dt) =
    DateTime::parse_from_rfc3339(raw)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  for format in NAIVE_FORMATS {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        raw, format
      )
    {
      return Ok(ndt.and_utc());
    }
  }

  Err(anyhow!(
    "unrecognized timestamp: {raw}"
  ))
}

#[must_use]
pub fn format_timestamp(
  dt: DateTime<Utc>
) -> String {
  dt.to_rfc3339_opts(
    SecondsFormat::Secs,
    true
  )
}

#[must_use]
pub fn format_local_date(
  dt: DateTime<Utc>
) -> String {
  dt.with_timezone(&Local)
    .format("%Y-%m-%d")
    .to_string()
}

#[must_use]
pub fn format_local_datetime(
  dt: DateTime<Utc>
) -> String {
  dt.with_timezone(&Local)
    .format("%Y-%m-%d %H:%M")
    .to_string()
}

/// Parses a user-entered due date.
///
/// Accepts `now`, `today`,
/// `tomorrow`, `yesterday`, a bare
/// `YYYY-MM-DD` (local midnight),
/// `YYYY-MM-DDTHH:MM` (local) and any
/// full timestamp `parse_timestamp`
/// understands.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "" => {
      return Err(anyhow!(
        "date expression is empty"
      ));
    }
    | "now" => return Ok(now),
    | "today" => {
      let date = now
        .with_timezone(&Local)
        .date_naive();
      return local_midnight(
        date, "today"
      );
    }
    | "tomorrow" => {
      let today =
        parse_date_expr("today", now)?;
      return Ok(
        today + Duration::days(1)
      );
    }
    | "yesterday" => {
      let today =
        parse_date_expr("today", now)?;
      return Ok(
        today - Duration::days(1)
      );
    }
    | _ => {}
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return local_midnight(
      date,
      "calendar-date"
    );
  }

  if let Ok(ndt) =
    NaiveDateTime::parse_from_str(
      token,
      "%Y-%m-%dT%H:%M"
    )
  {
    return to_utc_from_local(
      ndt,
      "local-datetime"
    );
  }

  parse_timestamp(token).with_context(
    || {
      format!(
        "unrecognized date \
         expression: {token}"
      )
    }
  )
}

fn local_midnight(
  date: NaiveDate,
  label: &str
) -> anyhow::Result<DateTime<Utc>> {
  let midnight = date
    .and_hms_opt(0, 0, 0)
    .ok_or_else(|| {
      anyhow!(
        "failed to construct \
         midnight for {label}"
      )
    })?;
  to_utc_from_local(midnight, label)
}

fn to_utc_from_local(
  ndt: NaiveDateTime,
  label: &str
) -> anyhow::Result<DateTime<Utc>> {
  Local
    .from_local_datetime(&ndt)
    .earliest()
    .map(|dt| dt.with_timezone(&Utc))
    .ok_or_else(|| {
      anyhow!(
        "{label}: local time {ndt} \
         does not exist"
      )
    })
}

pub mod iso_serde {
  use chrono::{
    DateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &super::format_timestamp(*dt)
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_timestamp(&raw)
      .map_err(serde::de::Error::custom)
  }

  pub mod option {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      dt: &Option<DateTime<Utc>>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match dt {
        | Some(value) => {
          super::serialize(
            value, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<DateTime<Utc>>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let opt =
        Option::<String>::deserialize(
          deserializer
        )?;
      match opt {
        | Some(raw)
          if raw.trim().is_empty() =>
        {
          Ok(None)
        }
        | Some(raw) => {
          super::super::parse_timestamp(
            &raw
          )
          .map(Some)
          .map_err(
            serde::de::Error::custom
          )
        }
        | None => Ok(None)
      }
    }
  }

  /// Serializer for a tri-state patch
  /// field: the outer `None` is
  /// skipped by the caller, the inner
  /// `None` goes out as `null`.
  pub mod patch {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::Serializer;

    pub fn serialize<S>(
      dt: &Option<Option<DateTime<Utc>>>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match dt {
        | Some(inner) => {
          super::option::serialize(
            inner, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }
  }
}
