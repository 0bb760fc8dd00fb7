//! MJD / BCD time decoding (EN 300 468 annex C) and local-time resolution.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::psi::tot::{LtoDescriptorInfo, OffsetPolarity, TotTable};

/// Gregorian date decoded from a Modified Julian Date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl CalendarDate {
    pub fn to_naive(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

/// Closed-form MJD → (year, month, day).
///
/// Valid from 1900-03-01 (MJD 15079) to 2100-02-28, which covers the whole
/// 16-bit MJD range a TDT/TOT can carry from that date on.
pub fn mjd_to_date(mjd: u16) -> CalendarDate {
    let mjd = f64::from(mjd);
    let y0 = ((mjd - 15078.2) / 365.25).floor();
    let m0 = ((mjd - 14956.1 - (y0 * 365.25).floor()) / 30.6001).floor();
    // day comes from the unadjusted year and month
    let d = mjd - 14956.0 - (y0 * 365.25).floor() - (m0 * 30.6001).floor();
    let k = if m0 == 14.0 || m0 == 15.0 { 1.0 } else { 0.0 };
    let y = y0 + k;
    let m = m0 - 1.0 - 12.0 * k;

    CalendarDate {
        year: y as i32 + 1900,
        month: m as u32,
        day: d as u32,
    }
}

/// Decodes one packed-BCD byte: 0x23 → 23.
pub fn bcd_to_decimal(byte: u8) -> u8 {
    10 * (byte >> 4) + (byte & 0x0F)
}

/// UTC date-time carried by an MJD + decoded h/m/s triple.
pub fn utc_datetime(mjd: u16, hours: u8, minutes: u8, seconds: u8) -> Option<NaiveDateTime> {
    let date = mjd_to_date(mjd).to_naive()?;
    let time = NaiveTime::from_hms_opt(hours.into(), minutes.into(), seconds.into())?;
    Some(NaiveDateTime::new(date, time))
}

/// Applies a local time offset entry to a UTC instant.
///
/// Ahead of UTC adds the offset, behind subtracts it; both carry across
/// minutes, hours and the date.
pub fn apply_local_time_offset(utc: NaiveDateTime, lto: &LtoDescriptorInfo) -> NaiveDateTime {
    let offset = Duration::hours(lto.local_time_offset_hours.into())
        + Duration::minutes(lto.local_time_offset_minutes.into());
    match lto.local_time_offset_polarity {
        OffsetPolarity::Ahead => utc + offset,
        OffsetPolarity::Behind => utc - offset,
    }
}

/// Local wall-clock time for a TDT's UTC instant.
///
/// The TOT entry is the one for `country` if broadcast, else the first entry;
/// without any entry the UTC time is returned unchanged.
pub fn resolve_local_time(
    utc: NaiveDateTime,
    tot: Option<&TotTable>,
    country: Option<&str>,
) -> NaiveDateTime {
    match tot.and_then(|t| t.offset_for(country)) {
        Some(lto) => apply_local_time_offset(utc, lto),
        None => utc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, Timelike};

    fn lto(polarity: OffsetPolarity, hours: u8, minutes: u8) -> LtoDescriptorInfo {
        LtoDescriptorInfo {
            country_code: *b"SRB",
            country_region_id: 0,
            local_time_offset_polarity: polarity,
            local_time_offset_hours: hours,
            local_time_offset_minutes: minutes,
            ..Default::default()
        }
    }

    fn at(mjd: u16, h: u8, m: u8) -> NaiveDateTime {
        utc_datetime(mjd, h, m, 0).unwrap()
    }

    #[test]
    fn mjd_golden_values() {
        assert_eq!(mjd_to_date(55097), CalendarDate { year: 2009, month: 9, day: 23 });
        // EN 300 468 annex C worked example: 0xC079
        assert_eq!(mjd_to_date(0xC079), CalendarDate { year: 1993, month: 10, day: 13 });
        assert_eq!(mjd_to_date(51544), CalendarDate { year: 2000, month: 1, day: 1 });
        assert_eq!(mjd_to_date(15079), CalendarDate { year: 1900, month: 3, day: 1 });
    }

    #[test]
    fn mjd_first_of_month() {
        assert_eq!(mjd_to_date(55013), CalendarDate { year: 2009, month: 7, day: 1 });
        assert_eq!(mjd_to_date(55105), CalendarDate { year: 2009, month: 10, day: 1 });
        assert_eq!(mjd_to_date(15140), CalendarDate { year: 1900, month: 5, day: 1 });
        assert!(utc_datetime(55105, 12, 0, 0).is_some());
    }

    #[test]
    fn mjd_agrees_with_day_count_from_epoch() {
        let epoch = NaiveDate::from_ymd_opt(1858, 11, 17).unwrap();
        for mjd in 15079..=u16::MAX {
            let expected = epoch.checked_add_days(Days::new(mjd.into())).unwrap();
            assert_eq!(mjd_to_date(mjd).to_naive(), Some(expected), "mjd {mjd}");
        }
    }

    #[test]
    fn bcd_digits() {
        assert_eq!(bcd_to_decimal(0x23), 23);
        assert_eq!(bcd_to_decimal(0x59), 59);
        assert_eq!(bcd_to_decimal(0x00), 0);
    }

    #[test]
    fn ahead_wraps_past_midnight() {
        let local = apply_local_time_offset(at(55097, 23, 50), &lto(OffsetPolarity::Ahead, 1, 0));
        assert_eq!((local.hour(), local.minute()), (0, 50));
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2009, 9, 24).unwrap());
    }

    #[test]
    fn ahead_wrap_edges() {
        // lands exactly on 24:00 → 00:00 next day
        let local = apply_local_time_offset(at(55097, 22, 30), &lto(OffsetPolarity::Ahead, 1, 30));
        assert_eq!((local.hour(), local.minute()), (0, 0));
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2009, 9, 24).unwrap());

        // minutes reach exactly 60 and carry into the hour
        let local = apply_local_time_offset(at(55097, 10, 45), &lto(OffsetPolarity::Ahead, 0, 15));
        assert_eq!((local.hour(), local.minute()), (11, 0));

        // one minute short of either edge stays put
        let local = apply_local_time_offset(at(55097, 22, 29), &lto(OffsetPolarity::Ahead, 1, 30));
        assert_eq!((local.hour(), local.minute()), (23, 59));
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2009, 9, 23).unwrap());
    }

    #[test]
    fn resolves_with_matching_country() {
        use crate::psi::BoundedList;
        use crate::psi::tot::LocalTimeOffsetDescriptor;
        use crate::types::TableKind;

        let utc = at(55097, 23, 50);
        let mut entries = BoundedList::new();
        entries.push(lto(OffsetPolarity::Behind, 3, 0), TableKind::Tot).unwrap();
        let mut ahead = lto(OffsetPolarity::Ahead, 2, 0);
        ahead.country_code = *b"DEU";
        entries.push(ahead, TableKind::Tot).unwrap();
        let mut descriptors = BoundedList::new();
        descriptors
            .push(
                LocalTimeOffsetDescriptor { descriptor_tag: 0x58, descriptor_length: 26, entries },
                TableKind::Tot,
            )
            .unwrap();
        let tot = TotTable { descriptors, ..Default::default() };

        let de = resolve_local_time(utc, Some(&tot), Some("DEU"));
        assert_eq!((de.hour(), de.minute()), (1, 50));
        let fallback = resolve_local_time(utc, Some(&tot), None);
        assert_eq!((fallback.hour(), fallback.minute()), (20, 50));
        assert_eq!(resolve_local_time(utc, None, Some("DEU")), utc);
    }

    #[test]
    fn behind_borrows_from_previous_day() {
        let local = apply_local_time_offset(at(55097, 0, 30), &lto(OffsetPolarity::Behind, 1, 0));
        assert_eq!((local.hour(), local.minute()), (23, 30));
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2009, 9, 22).unwrap());

        let local = apply_local_time_offset(at(55097, 12, 10), &lto(OffsetPolarity::Behind, 3, 30));
        assert_eq!((local.hour(), local.minute()), (8, 40));
    }
}
