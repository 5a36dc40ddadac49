use racecast::core::handle_broadcast::handle_broadcast;
use racecast::core::race::Race;
use racecast::core::race_snapshot::RaceStatus;
use racecast::core::stage::{build_stages, StagePars};
use racecast::error::TrackerError;
use racecast::interfaces::transport_interface::{event_queue, Outbound, StopToken};
use racecast::post::events::{
    Event, RACE_SETUP, RACE_STATUS, TEAM_CHECKPOINT, TEAM_END, TEAM_OVERTAKE, TEAM_START,
};
use racecast::pre::race_file::{RaceFile, RaceFileSource};
use racecast::pre::read_route::read_route;
use racecast::pre::record::Record;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

const HEADER: &str = "Numéro\tNom\tDistance\tInterm (S1)\tInterm (S2)\tClt Interm-1 (S1)\t\
                      Clt Interm-1 (S2)\t21|1\t22|1\t31|1\t32|1";

fn line(bib: u32, starts: &[&str], ends: &[&str], splits: &[&str]) -> String {
    let cell = |values: &[&str], i: usize| values.get(i).copied().unwrap_or("0").to_owned();
    let rank = |i: usize| if i < splits.len() { "1" } else { "0" };
    [
        bib.to_string(),
        format!("Équipe {}", bib),
        "0.3".to_owned(),
        cell(splits, 0),
        cell(splits, 1),
        rank(0).to_owned(),
        rank(1).to_owned(),
        cell(starts, 0),
        cell(starts, 1),
        cell(ends, 0),
        cell(ends, 1),
    ]
    .join("\t")
}

fn content(lines: &[String]) -> String {
    let mut content = HEADER.to_owned();
    for line in lines {
        content.push('\n');
        content.push_str(line);
    }
    content.push('\n');
    content
}

/// Rewrites the race file with the next scripted content before every read, the way the timing
/// system does between two polls.
struct TimingSystem {
    race_file: RaceFile,
    path: PathBuf,
    contents: Vec<String>,
}

impl RaceFileSource for TimingSystem {
    fn read_records(&mut self) -> Result<Vec<Record>, TrackerError> {
        if !self.contents.is_empty() {
            let next = self.contents.remove(0);
            let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(&next);
            std::fs::write(&self.path, &bytes).unwrap();
        }
        self.race_file.read_records()
    }
}

fn write_route(dir: &Path) -> PathBuf {
    let path = dir.join("route.gpx");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, r#"<?xml version="1.0" encoding="UTF-8"?>"#).unwrap();
    writeln!(
        file,
        r#"<gpx version="1.1" creator="racecast" xmlns="http://www.topografix.com/GPX/1/1">"#
    )
    .unwrap();
    writeln!(file, "<trk><name>Raid</name><trkseg>").unwrap();
    for i in 0..6 {
        writeln!(
            file,
            r#"<trkpt lat="{}" lon="0.0"><ele>100</ele></trkpt>"#,
            i as f64 * 0.0005
        )
        .unwrap();
    }
    writeln!(file, "</trkseg></trk></gpx>").unwrap();
    path
}

fn race(dir: &Path) -> Race {
    let stages = build_stages(&[
        StagePars { name: "Trail".to_owned(), length: 100.0, timed: true },
        StagePars { name: "Liaison".to_owned(), length: 100.0, timed: false },
        StagePars { name: "VTT".to_owned(), length: 100.0, timed: true },
    ])
    .unwrap();
    let route = read_route(&write_route(dir), &stages).unwrap();
    Race::new("Raid", route, stages, 1.0, 300.0).unwrap()
}

fn batches(rx: &flume::Receiver<Outbound>) -> Vec<Vec<Event>> {
    let mut batches = Vec::new();
    for item in rx.try_iter() {
        match item {
            Outbound::Batch(batch) => batches.push(batch),
            Outbound::Closed => return batches,
        }
    }
    panic!("terminal marker missing");
}

fn ids(batch: &[Event]) -> Vec<u8> {
    batch.iter().map(Event::id).collect()
}

#[test]
fn test_broadcast_whole_race() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.txt");
    let start = &["10:00:00"][..];

    let contents = vec![
        content(&[]),
        content(&[line(1, &[], &[], &[]), line(2, &[], &[], &[])]),
        content(&[line(1, start, &[], &[]), line(2, start, &[], &[])]),
        content(&[
            line(1, start, &[], &[]),
            line(2, &["10:00:00", "10:01:00"], &["10:00:30"], &["00:00:30"]),
        ]),
        content(&[
            line(2, &["10:00:00", "10:01:00"], &["10:00:30", "10:02:00"], &["00:00:30", "00:01:00"]),
            line(1, &["10:00:00", "10:02:00"], &["10:01:00", "10:03:00"], &["00:01:00", "00:01:00"]),
        ]),
    ];

    let mut race = race(dir.path());
    let mut source = TimingSystem {
        race_file: RaceFile::new(&path, "windows-1252").unwrap(),
        path,
        contents,
    };
    let (queue, handle) = event_queue(50);
    let stop = StopToken::new();

    handle_broadcast(&mut race, &mut source, Duration::ZERO, &queue, &stop).unwrap();

    let batches = batches(&handle.rx);
    let all_ids: Vec<Vec<u8>> = batches.iter().map(|b| ids(b)).collect();
    assert_eq!(all_ids[0], vec![RACE_SETUP]);
    assert_eq!(all_ids[1], vec![RACE_STATUS]);
    assert_eq!(all_ids[2], vec![RACE_STATUS]);
    assert_eq!(all_ids[3], vec![TEAM_START, TEAM_START]);
    assert_eq!(all_ids[4], vec![TEAM_CHECKPOINT, TEAM_OVERTAKE]);
    assert_eq!(all_ids[5], vec![RACE_STATUS]);
    assert_eq!(all_ids[6].iter().filter(|&&id| id == TEAM_END).count(), 2);
    assert_eq!(batches.len(), 7);

    match &batches[0][0] {
        Event::RaceSetup(payload) => {
            assert_eq!(payload.distance, 300.0);
            assert_eq!(payload.race_points.len(), 3);
            assert_eq!(payload.teams[0].name, "Équipe 1");
        }
        event => panic!("unexpected event {:?}", event),
    }

    let latest = handle.latest_race().unwrap();
    assert_eq!(latest.status, RaceStatus::Finished);
    assert!(latest.teams.iter().all(|t| t.covered_distance == 300.0));
    assert_eq!(race.teams[&2].rank(), 1);
}

#[test]
fn test_missing_race_file_stops_broadcast() {
    let dir = tempfile::tempdir().unwrap();
    let mut race = race(dir.path());
    let mut race_file = RaceFile::new(&dir.path().join("missing.txt"), "utf-8").unwrap();
    let (queue, handle) = event_queue(50);

    let result = handle_broadcast(&mut race, &mut race_file, Duration::ZERO, &queue, &StopToken::new());

    assert!(result.is_err());
    assert!(batches(&handle.rx).is_empty());
}

#[test]
fn test_batch_wire_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.txt");
    std::fs::write(&path, content(&[line(1, &["10:00:00"], &["10:00:30"], &["00:00:30"])])).unwrap();

    let mut race = race(dir.path());
    let mut race_file = RaceFile::new(&path, "utf-8").unwrap();
    let (queue, handle) = event_queue(50);
    let stop = StopToken::new();

    // one cycle driven by hand, then the loop only closes the queue
    let records = race_file.read_records().unwrap();
    assert_eq!(records.len(), 1);

    let mut state = racecast::core::handle_broadcast::BroadcastState::new();
    let cycle = state.run_cycle(&mut race, &records, 0.0, 1_700_000_000).unwrap();
    for batch in cycle.batches {
        let json = serde_json::to_value(&batch).unwrap();
        let first = &json.as_array().unwrap()[0];
        assert!(first["id"].is_u64());
        assert!(first["payload"].is_object());
        queue.send_batch(batch).unwrap();
    }
    stop.stop();
    handle_broadcast(&mut race, &mut race_file, Duration::ZERO, &queue, &stop).unwrap();

    let batches = batches(&handle.rx);
    let setup = serde_json::to_value(&batches[0]).unwrap();
    assert_eq!(setup[0]["id"], 0);
    assert_eq!(setup[0]["payload"]["name"], "Raid");
    assert_eq!(setup[0]["payload"]["racePoints"].as_array().unwrap().len(), 3);

    let status = serde_json::to_value(&batches[1]).unwrap();
    assert_eq!(status[0]["payload"]["status"], 1);
    assert_eq!(status[0]["payload"]["startTime"], 1_700_000_000);
}
