//! Store-level tests for the booking commands.
//! These run against an in-memory SQLite database seeded by `initialize`.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    use crate::commands::{availability, bookings, schedule_days, services, settings, weekly_schedule};
    use crate::db::Database;
    use crate::error::AppError;
    use crate::models::{
        AdminAction, AdminCreateBooking, AvailabilityQuery, BookingStatus, CreateBooking, ScheduleDay,
        ScheduleQuery, ScheduleSettings, ServiceInput, UpdateBooking, WeekdaySchedule,
    };
    use crate::scheduling::interval::minutes_of;
    use crate::scheduling::slots::UnavailableReason;
    use crate::scheduling::SchedulingError;

    // Seeded catalog: 1 is a 90 minute session, 2 to 4 are 60 minutes.
    const LONG_SERVICE: i64 = 1;
    const MASSAGE: i64 = 3;

    fn setup_test_db() -> Database {
        let db = Database::open_in_memory().expect("Failed to create in-memory database");
        db.initialize().expect("Failed to initialize schema");
        db
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    /// A moment well before the dates used in the tests.
    fn early_now() -> NaiveDateTime {
        date("2025-06-01").and_time(at(9, 0))
    }

    fn request(service_id: i64, day: &str, start: NaiveTime) -> CreateBooking {
        CreateBooking {
            service_id,
            booking_date: date(day),
            start_time: start,
            client_name: "Мария".to_string(),
            client_phone: "+7 (900) 123-45-67".to_string(),
            client_email: None,
            notes: None,
        }
    }

    /// 12:00-21:00 on an hourly grid with a 30 minute buffer.
    fn use_hourly_grid(db: &Database) {
        settings::update_settings(
            db,
            ScheduleSettings {
                time_slot_interval_minutes: 60,
                break_duration_minutes: 30,
                working_hours_start: at(12, 0),
                working_hours_end: at(21, 0),
            },
        )
        .unwrap();
    }

    fn is_conflict(result: &Result<impl std::fmt::Debug, AppError>) -> bool {
        matches!(result, Err(AppError::Scheduling(SchedulingError::SlotConflict)))
    }

    fn query(service_id: i64, day: &str) -> AvailabilityQuery {
        AvailabilityQuery {
            date: date(day),
            service_id,
        }
    }

    // ===== SETTINGS TESTS =====

    #[test]
    fn test_default_settings_seeded() {
        let db = setup_test_db();

        let current = settings::get_settings(&db).unwrap();
        assert_eq!(current.working_hours_start, at(12, 0));
        assert_eq!(current.working_hours_end, at(21, 0));
        assert_eq!(current.time_slot_interval_minutes, 30);
        assert_eq!(current.break_duration_minutes, 30);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let db = setup_test_db();
        db.initialize().unwrap();

        let all = services::get_services(&db, true).unwrap();
        assert_eq!(all.len(), 4, "Seed data must not be inserted twice");
    }

    #[test]
    fn test_update_settings_rejects_inverted_hours() {
        let db = setup_test_db();

        let result = settings::update_settings(
            &db,
            ScheduleSettings {
                time_slot_interval_minutes: 30,
                break_duration_minutes: 0,
                working_hours_start: at(18, 0),
                working_hours_end: at(10, 0),
            },
        );
        assert!(matches!(result, Err(AppError::Validation(_))));

        let zero_step = settings::update_settings(
            &db,
            ScheduleSettings {
                time_slot_interval_minutes: 0,
                break_duration_minutes: 0,
                working_hours_start: at(10, 0),
                working_hours_end: at(18, 0),
            },
        );
        assert!(matches!(zero_step, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_update_settings_rejects_oversized_values() {
        let db = setup_test_db();

        for (interval, buffer) in [(30, u32::MAX), (u32::MAX, 30), (30, 24 * 60 + 1)] {
            let result = settings::update_settings(
                &db,
                ScheduleSettings {
                    time_slot_interval_minutes: interval,
                    break_duration_minutes: buffer,
                    working_hours_start: at(12, 0),
                    working_hours_end: at(21, 0),
                },
            );
            assert!(matches!(result, Err(AppError::Validation(_))), "{interval}/{buffer} accepted");
        }

        assert_eq!(settings::get_settings(&db).unwrap().break_duration_minutes, 30);
    }

    #[test]
    fn test_oversized_stored_buffer_does_not_break_store() {
        let db = setup_test_db();
        bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now()).unwrap();
        db.conn
            .lock()
            .unwrap()
            .execute("UPDATE schedule_settings SET break_duration_minutes = 4294967295", [])
            .unwrap();

        let second = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(18, 0)), early_now());
        assert!(matches!(
            second,
            Err(AppError::Scheduling(SchedulingError::InvalidConfiguration(_)))
        ));

        let offered = availability::get_availability(&db, query(MASSAGE, "2025-06-10"), Some(early_now())).unwrap();
        assert!(offered.available_slots.is_empty());
        assert!(offered.message.is_some());

        use_hourly_grid(&db);
        let after = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(18, 0)), early_now());
        assert!(after.is_ok(), "Store stays usable once settings are fixed");
    }

    #[test]
    fn test_update_settings_persists() {
        let db = setup_test_db();
        use_hourly_grid(&db);

        let current = settings::get_settings(&db).unwrap();
        assert_eq!(current.time_slot_interval_minutes, 60);
    }

    // ===== SERVICE TESTS =====

    #[test]
    fn test_create_service_normalizes_duration() {
        let db = setup_test_db();

        let service = services::create_service(
            &db,
            ServiceInput {
                name: "Энергетическая сессия".to_string(),
                duration: "1.5ч".to_string(),
                price: "5 000 ₽".to_string(),
                category: "Целительство".to_string(),
                description: None,
            },
        )
        .unwrap();
        assert_eq!(service.duration_minutes, 90);
        assert_eq!(service.duration_label, "1.5ч");

        let plain = services::create_service(
            &db,
            ServiceInput {
                name: "Консультация".to_string(),
                duration: "45".to_string(),
                price: "2 000 ₽".to_string(),
                category: "Прочее".to_string(),
                description: None,
            },
        )
        .unwrap();
        assert_eq!(plain.duration_minutes, 45);
        assert_eq!(plain.duration_label, "45 мин");
    }

    #[test]
    fn test_create_service_rejects_session_count() {
        let db = setup_test_db();

        let result = services::create_service(
            &db,
            ServiceInput {
                name: "Интенсивная программа".to_string(),
                duration: "3 сессии".to_string(),
                price: "18 000 ₽".to_string(),
                category: "Access Bars".to_string(),
                description: None,
            },
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_deactivated_service_hidden_and_unbookable() {
        let db = setup_test_db();

        services::deactivate_service(&db, MASSAGE).unwrap();

        let visible = services::get_services(&db, false).unwrap();
        assert!(visible.iter().all(|s| s.id != MASSAGE));
        assert_eq!(services::get_services(&db, true).unwrap().len(), 4);

        let result = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now());
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_update_missing_service() {
        let db = setup_test_db();

        let result = services::update_service(
            &db,
            999,
            ServiceInput {
                name: "Ghost".to_string(),
                duration: "60 мин".to_string(),
                price: String::new(),
                category: String::new(),
                description: None,
            },
        );
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    // ===== AVAILABILITY TESTS =====

    #[test]
    fn test_availability_empty_day() {
        let db = setup_test_db();
        use_hourly_grid(&db);

        let result = availability::get_availability(&db, query(MASSAGE, "2025-06-10"), Some(early_now())).unwrap();

        assert_eq!(
            result.available_slots,
            vec!["12:00", "13:00", "14:00", "15:00", "16:00", "17:00", "18:00", "19:00", "20:00"]
        );
        assert_eq!(result.service_duration, 60);
        assert!(result.message.is_none());
        let hours = result.working_hours.unwrap();
        assert_eq!(hours.start, at(12, 0));
        assert_eq!(hours.end, at(21, 0));
    }

    #[test]
    fn test_availability_blocks_booking_and_buffer() {
        let db = setup_test_db();
        use_hourly_grid(&db);

        let created = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now()).unwrap();
        bookings::update_booking_status(&db, created.booking_id, BookingStatus::Confirmed).unwrap();

        let result = availability::get_availability(&db, query(MASSAGE, "2025-06-10"), Some(early_now())).unwrap();
        let slot = |h| result.slots.iter().find(|s| s.time == at(h, 0)).unwrap();

        assert!(slot(13).available);
        assert_eq!(slot(14).reason, Some(UnavailableReason::BookingConflict));
        assert_eq!(slot(15).reason, Some(UnavailableReason::Buffer));
        assert!(slot(16).available);
        assert_eq!(result.available_slots.len(), 7);
    }

    #[test]
    fn test_availability_ignores_cancelled_and_other_dates() {
        let db = setup_test_db();
        use_hourly_grid(&db);

        let created = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now()).unwrap();
        bookings::update_booking_status(&db, created.booking_id, BookingStatus::Cancelled).unwrap();
        bookings::create_booking(&db, request(MASSAGE, "2025-06-11", at(16, 0)), early_now()).unwrap();

        let result = availability::get_availability(&db, query(MASSAGE, "2025-06-10"), Some(early_now())).unwrap();
        assert_eq!(result.available_slots.len(), 9);
    }

    #[test]
    fn test_availability_long_service_stops_before_closing() {
        let db = setup_test_db();

        let half_hourly =
            availability::get_availability(&db, query(LONG_SERVICE, "2025-06-10"), Some(early_now())).unwrap();
        assert_eq!(half_hourly.available_slots.last().map(String::as_str), Some("19:30"));
        assert!(!half_hourly.available_slots.contains(&"20:00".to_string()));

        use_hourly_grid(&db);
        let hourly = availability::get_availability(&db, query(LONG_SERVICE, "2025-06-10"), Some(early_now())).unwrap();
        assert_eq!(hourly.available_slots.last().map(String::as_str), Some("19:00"));
    }

    #[test]
    fn test_availability_past_date_client_vs_admin() {
        let db = setup_test_db();
        let now = date("2025-06-12").and_time(at(10, 0));

        let client = availability::get_availability(&db, query(MASSAGE, "2025-06-10"), Some(now));
        assert!(matches!(client, Err(AppError::Scheduling(SchedulingError::PastDate))));

        let admin = availability::get_availability(&db, query(MASSAGE, "2025-06-10"), None).unwrap();
        assert!(!admin.available_slots.is_empty());
    }

    #[test]
    fn test_availability_marks_elapsed_slots_today() {
        let db = setup_test_db();
        use_hourly_grid(&db);
        let now = date("2025-06-10").and_time(at(15, 10));

        let result = availability::get_availability(&db, query(MASSAGE, "2025-06-10"), Some(now)).unwrap();

        assert_eq!(result.available_slots.first().map(String::as_str), Some("16:00"));
        let fifteen = result.slots.iter().find(|s| s.time == at(15, 0)).unwrap();
        assert_eq!(fifteen.reason, Some(UnavailableReason::Past));
    }

    #[test]
    fn test_availability_day_off() {
        let db = setup_test_db();

        schedule_days::upsert_schedule_day(
            &db,
            ScheduleDay {
                date: date("2025-06-12"),
                is_working: false,
                start_time: None,
                end_time: None,
                break_start: None,
                break_end: None,
                notes: Some("Праздник".to_string()),
            },
        )
        .unwrap();

        let result = availability::get_availability(&db, query(MASSAGE, "2025-06-12"), Some(early_now())).unwrap();
        assert!(result.available_slots.is_empty());
        assert!(result.working_hours.is_none());
        assert!(result.message.is_some());

        let booking = bookings::create_booking(&db, request(MASSAGE, "2025-06-12", at(14, 0)), early_now());
        assert!(matches!(
            booking,
            Err(AppError::Scheduling(SchedulingError::OutOfWindow(_)))
        ));
    }

    #[test]
    fn test_availability_day_override_with_lunch_break() {
        let db = setup_test_db();
        use_hourly_grid(&db);

        schedule_days::upsert_schedule_day(
            &db,
            ScheduleDay {
                date: date("2025-06-13"),
                is_working: true,
                start_time: Some(at(10, 0)),
                end_time: Some(at(16, 0)),
                break_start: Some(at(13, 0)),
                break_end: Some(at(14, 0)),
                notes: None,
            },
        )
        .unwrap();

        let result = availability::get_availability(&db, query(MASSAGE, "2025-06-13"), Some(early_now())).unwrap();
        assert_eq!(
            result.available_slots,
            vec!["10:00", "11:00", "12:00", "14:00", "15:00"]
        );
        let view = result.working_hours.unwrap();
        assert_eq!(view.break_start, Some(at(13, 0)));

        let days = schedule_days::get_schedule_days(&db, date("2025-06-01"), date("2025-06-30")).unwrap();
        assert_eq!(days.len(), 1);

        schedule_days::delete_schedule_day(&db, date("2025-06-13")).unwrap();
        let restored = availability::get_availability(&db, query(MASSAGE, "2025-06-13"), Some(early_now())).unwrap();
        assert_eq!(restored.available_slots.len(), 9);
    }

    #[test]
    fn test_schedule_day_rejects_half_break() {
        let db = setup_test_db();

        let result = schedule_days::upsert_schedule_day(
            &db,
            ScheduleDay {
                date: date("2025-06-13"),
                is_working: true,
                start_time: None,
                end_time: None,
                break_start: Some(at(13, 0)),
                break_end: None,
                notes: None,
            },
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_availability_broken_settings_reports_no_slots() {
        let db = setup_test_db();
        db.conn
            .lock()
            .unwrap()
            .execute("UPDATE schedule_settings SET time_slot_interval_minutes = 0", [])
            .unwrap();

        let result = availability::get_availability(&db, query(MASSAGE, "2025-06-10"), Some(early_now())).unwrap();
        assert!(result.available_slots.is_empty());
        assert!(result.message.is_some());

        db.conn
            .lock()
            .unwrap()
            .execute("UPDATE schedule_settings SET break_duration_minutes = -5", [])
            .unwrap();
        let negative = availability::get_availability(&db, query(MASSAGE, "2025-06-10"), Some(early_now())).unwrap();
        assert!(negative.available_slots.is_empty());
    }

    #[test]
    fn test_availability_unknown_service() {
        let db = setup_test_db();

        let result = availability::get_availability(&db, query(999, "2025-06-10"), Some(early_now()));
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    // ===== WEEKLY SCHEDULE TESTS =====

    fn weekday(day_of_week: u32, is_working: bool) -> WeekdaySchedule {
        WeekdaySchedule {
            day_of_week,
            is_working,
            start_time: None,
            end_time: None,
            break_start: None,
            break_end: None,
        }
    }

    #[test]
    fn test_weekly_template_closes_weekday() {
        let db = setup_test_db();
        use_hourly_grid(&db);
        weekly_schedule::upsert_weekday(&db, weekday(7, false)).unwrap();

        let sunday = availability::get_availability(&db, query(MASSAGE, "2025-06-15"), Some(early_now())).unwrap();
        assert!(sunday.available_slots.is_empty());
        assert!(sunday.working_hours.is_none());

        let monday = availability::get_availability(&db, query(MASSAGE, "2025-06-16"), Some(early_now())).unwrap();
        assert_eq!(monday.available_slots.len(), 9);

        // A date override reopens a single Sunday.
        schedule_days::upsert_schedule_day(
            &db,
            ScheduleDay {
                date: date("2025-06-15"),
                is_working: true,
                start_time: None,
                end_time: None,
                break_start: None,
                break_end: None,
                notes: None,
            },
        )
        .unwrap();
        let reopened = availability::get_availability(&db, query(MASSAGE, "2025-06-15"), Some(early_now())).unwrap();
        assert_eq!(reopened.available_slots.len(), 9);
    }

    #[test]
    fn test_weekly_template_shortens_day() {
        let db = setup_test_db();
        use_hourly_grid(&db);
        weekly_schedule::upsert_weekday(
            &db,
            WeekdaySchedule {
                start_time: Some(at(10, 0)),
                end_time: Some(at(14, 0)),
                ..weekday(6, true)
            },
        )
        .unwrap();

        let saturday = availability::get_availability(&db, query(MASSAGE, "2025-06-14"), Some(early_now())).unwrap();
        assert_eq!(saturday.available_slots, vec!["10:00", "11:00", "12:00", "13:00"]);

        let late = bookings::create_booking(&db, request(MASSAGE, "2025-06-14", at(15, 0)), early_now());
        assert!(matches!(late, Err(AppError::Scheduling(SchedulingError::OutOfWindow(_)))));

        assert_eq!(weekly_schedule::get_weekly_schedule(&db).unwrap().len(), 1);
        weekly_schedule::delete_weekday(&db, 6).unwrap();
        let restored = availability::get_availability(&db, query(MASSAGE, "2025-06-14"), Some(early_now())).unwrap();
        assert_eq!(restored.available_slots.len(), 9);
    }

    #[test]
    fn test_weekly_template_validation() {
        let db = setup_test_db();

        assert!(matches!(
            weekly_schedule::upsert_weekday(&db, weekday(8, true)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            weekly_schedule::upsert_weekday(
                &db,
                WeekdaySchedule {
                    break_start: Some(at(13, 0)),
                    ..weekday(1, true)
                }
            ),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            weekly_schedule::upsert_weekday(
                &db,
                WeekdaySchedule {
                    start_time: Some(at(18, 0)),
                    end_time: Some(at(9, 0)),
                    ..weekday(1, true)
                }
            ),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            weekly_schedule::delete_weekday(&db, 3),
            Err(AppError::NotFound(_))
        ));
    }

    // ===== SCHEDULE RANGE TESTS =====

    #[test]
    fn test_schedule_range_skips_days_off() {
        let db = setup_test_db();
        weekly_schedule::upsert_weekday(&db, weekday(7, false)).unwrap();
        schedule_days::upsert_schedule_day(
            &db,
            ScheduleDay {
                date: date("2025-06-12"),
                is_working: false,
                start_time: None,
                end_time: None,
                break_start: None,
                break_end: None,
                notes: None,
            },
        )
        .unwrap();

        let schedule = availability::get_schedule(
            &db,
            ScheduleQuery {
                service_id: MASSAGE,
                from: Some(date("2025-06-10")),
                days: None,
            },
            early_now().date(),
            Some(early_now()),
        )
        .unwrap();

        let dates: Vec<_> = schedule.iter().map(|a| a.date).collect();
        assert_eq!(
            dates,
            vec![
                date("2025-06-10"),
                date("2025-06-11"),
                date("2025-06-13"),
                date("2025-06-14"),
                date("2025-06-16")
            ]
        );
        assert!(schedule.iter().all(|a| !a.available_slots.is_empty()));
    }

    #[test]
    fn test_schedule_range_defaults_to_this_week() {
        let db = setup_test_db();
        use_hourly_grid(&db);
        let now = date("2025-06-10").and_time(at(15, 10));

        let schedule = availability::get_schedule(
            &db,
            ScheduleQuery {
                service_id: MASSAGE,
                from: None,
                days: None,
            },
            now.date(),
            Some(now),
        )
        .unwrap();

        assert_eq!(schedule.len(), 7);
        assert_eq!(schedule[0].date, date("2025-06-10"));
        assert_eq!(schedule[0].available_slots.first().map(String::as_str), Some("16:00"));
        assert_eq!(schedule[1].available_slots.len(), 9);
    }

    #[test]
    fn test_schedule_range_validation() {
        let db = setup_test_db();
        let today = date("2025-06-10");
        let range = |from: &str, days| ScheduleQuery {
            service_id: MASSAGE,
            from: Some(date(from)),
            days: Some(days),
        };

        for days in [0, 32] {
            assert!(matches!(
                availability::get_schedule(&db, range("2025-06-10", days), today, None),
                Err(AppError::Validation(_))
            ));
        }

        let now = today.and_time(at(9, 0));
        let client = availability::get_schedule(&db, range("2025-06-01", 3), today, Some(now));
        assert!(matches!(client, Err(AppError::Scheduling(SchedulingError::PastDate))));

        let admin = availability::get_schedule(&db, range("2025-06-01", 3), today, None).unwrap();
        assert_eq!(admin.len(), 3);
    }

    // ===== BOOKING TESTS =====

    #[test]
    fn test_create_booking_pending() {
        let db = setup_test_db();

        let created = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now()).unwrap();
        assert!(created.success);
        assert_eq!(created.status, BookingStatus::Pending);
        assert_eq!(created.end_time, at(15, 0));

        let stored = bookings::get_booking(&db, created.booking_id).unwrap();
        assert_eq!(stored.service_name, "Классический массаж");
        assert_eq!(stored.start_time, at(14, 0));
        assert_eq!(stored.end_time, at(15, 0));
        assert_eq!(stored.status, BookingStatus::Pending);
        assert!(!stored.created_at.is_empty());
    }

    #[test]
    fn test_create_booking_rejects_conflict() {
        let db = setup_test_db();
        bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now()).unwrap();

        let same = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now());
        assert!(is_conflict(&same));

        let overlapping = bookings::create_booking(&db, request(LONG_SERVICE, "2025-06-10", at(13, 0)), early_now());
        assert!(is_conflict(&overlapping), "13:00-14:30 runs into the 14:00 session");
    }

    #[test]
    fn test_create_booking_respects_buffer() {
        let db = setup_test_db();
        bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now()).unwrap();

        let in_buffer = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(15, 0)), early_now());
        assert!(is_conflict(&in_buffer));

        let after_buffer = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(15, 30)), early_now());
        assert!(after_buffer.is_ok());
    }

    #[test]
    fn test_create_booking_outside_window() {
        let db = setup_test_db();

        let early = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(11, 0)), early_now());
        assert!(matches!(early, Err(AppError::Scheduling(SchedulingError::OutOfWindow(_)))));

        let overrun = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(20, 30)), early_now());
        assert!(matches!(overrun, Err(AppError::Scheduling(SchedulingError::OutOfWindow(_)))));

        let last = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(20, 0)), early_now());
        assert!(last.is_ok(), "A session ending exactly at closing time is allowed");
    }

    #[test]
    fn test_create_booking_past_date() {
        let db = setup_test_db();
        let now = date("2025-06-11").and_time(at(9, 0));

        let result = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), now);
        assert!(matches!(result, Err(AppError::Scheduling(SchedulingError::PastDate))));

        let count: i64 = db
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_create_booking_requires_contact() {
        let db = setup_test_db();

        let mut nameless = request(MASSAGE, "2025-06-10", at(14, 0));
        nameless.client_name = "  ".to_string();
        assert!(matches!(
            bookings::create_booking(&db, nameless, early_now()),
            Err(AppError::Validation(_))
        ));

        let mut bad_phone = request(MASSAGE, "2025-06-10", at(14, 0));
        bad_phone.client_phone = "call me".to_string();
        assert!(matches!(
            bookings::create_booking(&db, bad_phone, early_now()),
            Err(AppError::Validation(_))
        ));

        let mut bad_email = request(MASSAGE, "2025-06-10", at(14, 0));
        bad_email.client_email = Some("nobody".to_string());
        assert!(matches!(
            bookings::create_booking(&db, bad_email, early_now()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_cancelled_booking_frees_slot() {
        let db = setup_test_db();
        let created = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now()).unwrap();

        bookings::update_booking_status(&db, created.booking_id, BookingStatus::Cancelled).unwrap();

        let again = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now());
        assert!(again.is_ok());
    }

    #[test]
    fn test_admin_create_booking_in_past() {
        let db = setup_test_db();

        let created = bookings::admin_create_booking(
            &db,
            AdminCreateBooking {
                booking: request(MASSAGE, "2020-01-15", at(14, 0)),
                status: Some(BookingStatus::Confirmed),
            },
        )
        .unwrap();
        assert_eq!(created.status, BookingStatus::Confirmed);

        let conflict = bookings::admin_create_booking(
            &db,
            AdminCreateBooking {
                booking: request(MASSAGE, "2020-01-15", at(14, 30)),
                status: None,
            },
        );
        assert!(is_conflict(&conflict), "Admins go through the same conflict check");
    }

    #[test]
    fn test_admin_completed_booking_does_not_block() {
        let db = setup_test_db();

        bookings::admin_create_booking(
            &db,
            AdminCreateBooking {
                booking: request(MASSAGE, "2025-06-10", at(14, 0)),
                status: Some(BookingStatus::Completed),
            },
        )
        .unwrap();

        let result = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now());
        assert!(result.is_ok());
    }

    #[test]
    fn test_bookings_for_date_ordered() {
        let db = setup_test_db();
        bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(17, 0)), early_now()).unwrap();
        bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(12, 0)), early_now()).unwrap();
        bookings::create_booking(&db, request(MASSAGE, "2025-06-11", at(12, 0)), early_now()).unwrap();

        let day = bookings::get_bookings_for_date(&db, date("2025-06-10")).unwrap();
        let starts: Vec<_> = day.iter().map(|b| b.start_time).collect();
        assert_eq!(starts, vec![at(12, 0), at(17, 0)]);
    }

    #[test]
    fn test_unique_index_blocks_duplicate_active_start() {
        let db = setup_test_db();
        bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now()).unwrap();

        let conn = db.conn.lock().unwrap();
        let duplicate = conn.execute(
            "INSERT INTO bookings (service_id, service_name, booking_date, start_time, end_time, client_name, client_phone, status)
             VALUES (3, 'x', '2025-06-10', '14:00:00', '15:00:00', 'x', '1', 'confirmed')",
            [],
        );
        assert!(duplicate.is_err(), "Two active bookings may not share a start");

        let cancelled = conn.execute(
            "INSERT INTO bookings (service_id, service_name, booking_date, start_time, end_time, client_name, client_phone, status)
             VALUES (3, 'x', '2025-06-10', '14:00:00', '15:00:00', 'x', '1', 'cancelled')",
            [],
        );
        assert!(cancelled.is_ok());
    }

    // ===== STATUS TESTS =====

    #[test]
    fn test_status_transitions() {
        let db = setup_test_db();
        let id = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now())
            .unwrap()
            .booking_id;

        let confirmed = bookings::update_booking_status(&db, id, BookingStatus::Confirmed).unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let completed = bookings::update_booking_status(&db, id, BookingStatus::Completed).unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);

        let reopen = bookings::update_booking_status(&db, id, BookingStatus::Pending);
        assert!(matches!(reopen, Err(AppError::InvalidTransition { .. })));

        let cancel = bookings::update_booking_status(&db, id, BookingStatus::Cancelled);
        assert!(matches!(cancel, Err(AppError::InvalidTransition { .. })));
    }

    #[test]
    fn test_pending_cannot_complete() {
        let db = setup_test_db();
        let id = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now())
            .unwrap()
            .booking_id;

        let result = bookings::update_booking_status(&db, id, BookingStatus::Completed);
        assert!(matches!(
            result,
            Err(AppError::InvalidTransition {
                from: BookingStatus::Pending,
                to: BookingStatus::Completed
            })
        ));

        let same = bookings::update_booking_status(&db, id, BookingStatus::Pending).unwrap();
        assert_eq!(same.status, BookingStatus::Pending);
    }

    #[test]
    fn test_status_update_missing_booking() {
        let db = setup_test_db();
        let result = bookings::update_booking_status(&db, 42, BookingStatus::Confirmed);
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_client_cancel_requires_matching_phone() {
        let db = setup_test_db();
        let id = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now())
            .unwrap()
            .booking_id;

        let wrong = bookings::cancel_booking(&db, id, "+7 999 000-00-00");
        assert!(matches!(wrong, Err(AppError::NotFound(_))));

        let cancelled = bookings::cancel_booking(&db, id, "79001234567").unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    // ===== RESCHEDULE TESTS =====

    #[test]
    fn test_reschedule_excludes_own_interval() {
        let db = setup_test_db();
        let id = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now())
            .unwrap()
            .booking_id;

        let moved = bookings::update_booking(
            &db,
            UpdateBooking {
                booking_id: id,
                booking_date: date("2025-06-10"),
                start_time: at(14, 30),
                service_id: MASSAGE,
                status: None,
            },
        )
        .unwrap();

        assert_eq!(moved.start_time, at(14, 30));
        assert_eq!(moved.end_time, at(15, 30));
        assert_eq!(moved.status, BookingStatus::Pending);
    }

    #[test]
    fn test_reschedule_into_conflict_rejected() {
        let db = setup_test_db();
        bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now()).unwrap();
        let id = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(18, 0)), early_now())
            .unwrap()
            .booking_id;

        let result = bookings::update_booking(
            &db,
            UpdateBooking {
                booking_id: id,
                booking_date: date("2025-06-10"),
                start_time: at(15, 0),
                service_id: MASSAGE,
                status: Some(BookingStatus::Confirmed),
            },
        );
        assert!(is_conflict(&result));

        let unchanged = bookings::get_booking(&db, id).unwrap();
        assert_eq!(unchanged.start_time, at(18, 0));
        assert_eq!(unchanged.status, BookingStatus::Pending);
    }

    #[test]
    fn test_reschedule_with_longer_service_rechecks() {
        let db = setup_test_db();
        let id = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(13, 0)), early_now())
            .unwrap()
            .booking_id;
        bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 30)), early_now()).unwrap();

        // 13:00-14:30 touches the next session without overlapping it.
        let longer = bookings::update_booking(
            &db,
            UpdateBooking {
                booking_id: id,
                booking_date: date("2025-06-10"),
                start_time: at(13, 0),
                service_id: LONG_SERVICE,
                status: None,
            },
        )
        .unwrap();
        assert_eq!(longer.end_time, at(14, 30));

        let too_long = bookings::update_booking(
            &db,
            UpdateBooking {
                booking_id: id,
                booking_date: date("2025-06-10"),
                start_time: at(13, 30),
                service_id: LONG_SERVICE,
                status: None,
            },
        );
        assert!(is_conflict(&too_long));
    }

    #[test]
    fn test_reschedule_terminal_booking_rejected() {
        let db = setup_test_db();
        let id = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now())
            .unwrap()
            .booking_id;
        bookings::update_booking_status(&db, id, BookingStatus::Cancelled).unwrap();

        let result = bookings::update_booking(
            &db,
            UpdateBooking {
                booking_id: id,
                booking_date: date("2025-06-11"),
                start_time: at(14, 0),
                service_id: MASSAGE,
                status: None,
            },
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_admin_action_from_json() {
        let db = setup_test_db();
        let id = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 0)), early_now())
            .unwrap()
            .booking_id;

        let status: AdminAction = serde_json::from_str(&format!(
            r#"{{"action": "update_booking_status", "booking_id": {id}, "status": "confirmed"}}"#
        ))
        .unwrap();
        let booking = bookings::apply_admin_action(&db, status).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);

        let reschedule: AdminAction = serde_json::from_str(&format!(
            r#"{{"action": "update_booking", "booking_id": {id}, "booking_date": "2025-06-12",
                "start_time": "16:00", "service_id": {MASSAGE}}}"#
        ))
        .unwrap();
        let booking = bookings::apply_admin_action(&db, reschedule).unwrap();
        assert_eq!(booking.booking_date, date("2025-06-12"));
        assert_eq!(booking.start_time, at(16, 0));
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    // ===== INVARIANT TESTS =====

    #[test]
    fn test_no_two_active_bookings_overlap() {
        let db = setup_test_db();
        let buffer = settings::get_settings(&db).unwrap().break_duration_minutes;

        // Try every quarter hour with mixed services; most attempts collide.
        for (i, minute) in (12 * 60..21 * 60).step_by(15).enumerate() {
            let service = if i % 3 == 0 { LONG_SERVICE } else { MASSAGE };
            let start = at(minute / 60, minute % 60);
            let _ = bookings::create_booking(&db, request(service, "2025-06-10", start), early_now());
        }

        let active: Vec<_> = bookings::get_bookings_for_date(&db, date("2025-06-10"))
            .unwrap()
            .into_iter()
            .filter(|b| b.status.is_active())
            .collect();
        assert!(active.len() > 1);

        // A later session may not start inside an earlier one or its buffer.
        for a in &active {
            for b in &active {
                if a.id == b.id || b.start_time < a.start_time {
                    continue;
                }
                let a_occupied_end = minutes_of(a.end_time) + buffer;
                let b_start = minutes_of(b.start_time);
                assert!(
                    b_start >= a_occupied_end,
                    "booking {} starts inside booking {}",
                    b.id,
                    a.id
                );
            }
        }
    }

    #[test]
    fn test_every_offered_slot_can_be_booked() {
        let db = setup_test_db();
        bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(15, 0)), early_now()).unwrap();

        let offered = availability::get_availability(&db, query(LONG_SERVICE, "2025-06-10"), Some(early_now()))
            .unwrap()
            .available_slots;
        assert!(!offered.is_empty());

        for slot in offered {
            let start = NaiveTime::parse_from_str(&slot, "%H:%M").unwrap();
            let id = bookings::create_booking(&db, request(LONG_SERVICE, "2025-06-10", start), early_now())
                .unwrap_or_else(|e| panic!("slot {slot} was offered but rejected: {e}"))
                .booking_id;
            bookings::update_booking_status(&db, id, BookingStatus::Cancelled).unwrap();
        }
    }

    // ===== SCHEMA TESTS =====

    #[test]
    fn test_migrate_old_bookings_table() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .lock()
            .unwrap()
            .execute_batch(
                "
                CREATE TABLE bookings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    service_id INTEGER NOT NULL,
                    service_name TEXT NOT NULL,
                    booking_date DATE NOT NULL,
                    start_time TEXT NOT NULL,
                    end_time TEXT NOT NULL,
                    client_name TEXT NOT NULL,
                    client_phone TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'pending',
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
                );
                INSERT INTO bookings (service_id, service_name, booking_date, start_time, end_time, client_name, client_phone, status)
                VALUES (3, 'Классический массаж', '2025-06-10', '14:00:00', '15:00:00', 'Анна', '+7 900 000-00-00', 'confirmed');
                ",
            )
            .unwrap();

        db.initialize().unwrap();

        let old = bookings::get_booking(&db, 1).unwrap();
        assert_eq!(old.client_email, None);
        assert_eq!(old.status, BookingStatus::Confirmed);
        assert_eq!(old.updated_at, old.created_at);

        let result = bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(14, 30)), early_now());
        assert!(is_conflict(&result), "Migrated bookings still block their slot");
    }

    // ===== CONCURRENCY TESTS =====

    #[test]
    fn test_concurrent_submissions_one_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("booking.db");

        let first = Database::open(&path).unwrap();
        first.initialize().unwrap();
        let second = Database::open(&path).unwrap();
        second.initialize().unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [first, second]
            .into_iter()
            .map(|db| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(16, 0)), early_now())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(results.iter().filter(|r| is_conflict(*r)).count(), 1);

        let check = Database::open(&path).unwrap();
        let stored = bookings::get_bookings_for_date(&check, date("2025-06-10")).unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[test]
    fn test_concurrent_submissions_shared_handle() {
        let db = Arc::new(setup_test_db());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = Arc::clone(&db);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    bookings::create_booking(&db, request(MASSAGE, "2025-06-10", at(16, 0)), early_now())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(results.iter().filter(|r| is_conflict(*r)).count(), 7);
    }
}
