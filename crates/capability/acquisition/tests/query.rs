mod common;

use chrono::Duration as ChronoDuration;
use common::{date, harness};
use domain::{DailyAggregateRow, RawSample};
use ems_acquisition::{HistoryWindow, end_of_day_ms, start_of_day_ms};
use ems_storage::{DailyAggregateStore, SampleQuery, SampleStore};

#[tokio::test]
async fn day_data_zero_fills_missing_hours() {
    let h = harness();
    let day = date(2024, 3, 1);
    h.daily.upsert_hour(day, 9, 1200.0, 10).await.expect("upsert");
    h.daily.upsert_hour(day, 14, 1800.0, 20).await.expect("upsert");

    let data = h.engine.get_day_data(day).await;
    assert_eq!(data.hours.len(), 24);
    for (hour, value) in data.hours.iter().enumerate() {
        match hour {
            9 => assert_eq!(*value, 1200.0),
            14 => assert_eq!(*value, 1800.0),
            _ => assert_eq!(*value, 0.0),
        }
    }
    assert_eq!(data.last_update_ms, 20);

    let missing = h.engine.get_day_data(date(2024, 3, 2)).await;
    assert_eq!(missing.hours, [0.0; 24]);
}

#[tokio::test]
async fn date_range_returns_present_rows_only() {
    let h = harness();
    for day in [1, 3, 4] {
        h.daily
            .upsert_hour(date(2024, 3, day), 0, f64::from(day), 0)
            .await
            .expect("upsert");
    }
    let rows = h
        .engine
        .get_date_range_data(date(2024, 3, 1), date(2024, 3, 3))
        .await;
    let dates: Vec<_> = rows.iter().map(|row| row.date).collect();
    assert_eq!(dates, vec![date(2024, 3, 1), date(2024, 3, 3)]);

    assert!(
        h.engine
            .get_date_range_data(date(2024, 3, 5), date(2024, 3, 1))
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn summary_walks_every_date_in_window() {
    let h = harness();
    let today = date(2024, 3, 31);
    let put = |offset: i64, hours: &[(usize, f64)]| {
        let mut row = DailyAggregateRow::empty(today - ChronoDuration::days(offset));
        for (hour, value) in hours {
            row.hours[*hour] = *value;
        }
        h.daily.put_row(row).expect("put");
    };
    put(0, &[(8, 2.0), (9, 3.0)]);
    put(3, &[(12, 10.0)]);
    put(6, &[(1, 1.0)]);
    put(7, &[(1, 100.0)]);
    put(29, &[(23, 7.0)]);
    // 窗口外
    put(30, &[(0, 1000.0)]);

    let summary = h.engine.query().energy_summary_at(today).await;
    assert_eq!(summary.daily_totals.len(), 30);
    assert_eq!(
        summary.daily_totals.first().map(|entry| entry.date),
        Some(today - ChronoDuration::days(29))
    );
    assert_eq!(summary.daily_totals.last().map(|entry| entry.date), Some(today));
    assert_eq!(summary.today, 5.0);
    assert_eq!(summary.weekly, 16.0);
    assert_eq!(summary.monthly, 123.0);

    let last_seven: f64 = summary.daily_totals[23..].iter().map(|entry| entry.total).sum();
    let all: f64 = summary.daily_totals.iter().map(|entry| entry.total).sum();
    assert_eq!(last_seven, summary.weekly);
    assert_eq!(all, summary.monthly);
    assert_eq!(
        summary
            .daily_totals
            .iter()
            .filter(|entry| entry.total == 0.0)
            .count(),
        25
    );
}

#[tokio::test]
async fn delete_by_range_is_inclusive_by_day() {
    let h = harness();
    let d1 = date(2024, 3, 1);
    let d2 = date(2024, 3, 2);
    let d3 = date(2024, 3, 3);
    let d4 = date(2024, 3, 4);
    let samples = vec![
        RawSample::new(end_of_day_ms(d1), "D430", 1.0, None),
        RawSample::new(start_of_day_ms(d2), "D430", 2.0, None),
        RawSample::new(start_of_day_ms(d2) + 3_600_000, "D432", 3.0, None),
        RawSample::new(end_of_day_ms(d3), "D430", 4.0, None),
        RawSample::new(start_of_day_ms(d4), "D430", 5.0, None),
    ];
    h.samples.insert_samples(&samples).await.expect("insert");
    for day in [d1, d2, d3, d4] {
        h.daily.upsert_hour(day, 0, 1.0, 0).await.expect("upsert");
    }

    let removed = h.engine.delete_by_range(d2, d3, Some("D430")).await;
    assert_eq!(removed, 2);
    assert_eq!(h.samples.len(), 3);
    assert_eq!(h.daily.len(), 4);

    let removed = h.engine.delete_by_range(d2, d3, None).await;
    assert_eq!(removed, 1 + 2);
    let left: Vec<f64> = h
        .samples
        .query_samples(&SampleQuery::for_point("D430"))
        .await
        .expect("query")
        .iter()
        .map(|sample| sample.value)
        .collect();
    assert_eq!(left, vec![1.0, 5.0]);
    assert!(h.daily.get_day(d2).await.expect("get").is_none());
    assert!(h.daily.get_day(d1).await.expect("get").is_some());
    assert!(h.daily.get_day(d4).await.expect("get").is_some());
}

#[tokio::test]
async fn cleanup_prunes_only_old_samples() {
    let h = harness();
    let now_ms = 100 * 86_400_000;
    let samples = vec![
        RawSample::new(now_ms - 40 * 86_400_000, "D430", 1.0, None),
        RawSample::new(now_ms - 31 * 86_400_000, "D430", 2.0, None),
        RawSample::new(now_ms - 29 * 86_400_000, "D430", 3.0, None),
        RawSample::new(now_ms - 1_000, "D430", 4.0, None),
    ];
    h.samples.insert_samples(&samples).await.expect("insert");
    h.daily
        .upsert_hour(date(1970, 1, 2), 0, 1.0, 0)
        .await
        .expect("upsert");

    let removed = h.engine.query().cleanup_before(30, now_ms).await;
    assert_eq!(removed, 2);
    assert_eq!(h.samples.len(), 2);
    assert_eq!(h.daily.len(), 1);

    assert_eq!(h.engine.query().cleanup_before(0, now_ms).await, 0);
    assert_eq!(h.samples.len(), 2);
}

#[tokio::test]
async fn point_history_is_ascending_for_both_windows() {
    let h = harness();
    let now_ms = 10 * 3_600_000;
    let samples: Vec<RawSample> = (0..10)
        .map(|hour| RawSample::new(hour * 3_600_000 + 1, "D430", hour as f64, None))
        .collect();
    h.samples.insert_samples(&samples).await.expect("insert");

    let recent = h
        .engine
        .query()
        .point_history_at("D430", HistoryWindow::HoursBack(3), now_ms)
        .await;
    let values: Vec<f64> = recent.iter().map(|sample| sample.value).collect();
    assert_eq!(values, vec![7.0, 8.0, 9.0]);

    let limited = h
        .engine
        .query()
        .point_history_at("D430", HistoryWindow::Limit(4), now_ms)
        .await;
    let values: Vec<f64> = limited.iter().map(|sample| sample.value).collect();
    assert_eq!(values, vec![6.0, 7.0, 8.0, 9.0]);

    assert!(
        h.engine
            .get_point_history("missing", HistoryWindow::Limit(5))
            .await
            .is_empty()
    );
}
