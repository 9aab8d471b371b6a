// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialize a `Payload`.

use crate::{Payload, SerializeError};
use serde::Serializer;
use std::{io, time::Duration};

pub(crate) fn serialize_payload(
    payload: &Payload,
    mut writer: impl io::Write,
) -> Result<(), SerializeError> {
    serde_json::to_writer(&mut writer, payload)?;
    Ok(())
}

/// Durations are sent as whole milliseconds.
#[allow(clippy::ref_option, reason = "serde's serialize_with passes &Option")]
pub(crate) fn serialize_duration_ms<S>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match duration {
        Some(duration) => {
            let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
            serializer.serialize_u64(millis)
        }
        None => serializer.serialize_none(),
    }
}
