use criterion::{Criterion, criterion_group, criterion_main};
use match_rag::embeddings::build_chunks;
use serde_json::{Value, json};
use std::hint::black_box;
use std::path::Path;

fn side(first_id: u64) -> Value {
    let players: Vec<Value> = (first_id..first_id + 16)
        .map(|id| {
            json!({
                "player": {"id": id, "name": format!("Player {id}"), "slug": format!("player-{id}")},
                "position": "M",
                "substitute": id % 16 >= 11,
                "statistics": {
                    "totalPass": id % 60,
                    "accuratePass": id % 45,
                    "minutesPlayed": 90,
                    "rating": 6.8
                }
            })
        })
        .collect();
    json!({"players": players})
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let record = json!({"raw": {
        "core": {"event": {
            "id": 12_000_000,
            "startTimestamp": 1_713_128_400,
            "roundInfo": {"round": 3},
            "season": {"year": "2024"},
            "homeTeam": {"id": 1, "name": "Grêmio"},
            "awayTeam": {"id": 2, "name": "Internacional"},
            "homeScore": {"current": 2},
            "awayScore": {"current": 1}
        }},
        "lineups": {"home": side(100), "away": side(200)}
    }});
    let source = Path::new("rounds/r03/match.json");

    c.bench_function("chunking", |b| {
        b.iter(|| build_chunks(black_box(&record), black_box(source)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
