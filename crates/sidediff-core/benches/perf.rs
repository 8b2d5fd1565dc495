use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sidediff_core::{Boundary, ColorMap, Folder, Layout, Options, Session};
use std::io::Cursor;

fn colored_line(words: usize) -> String {
    (0..words)
        .map(|i| match i % 3 {
            0 => format!("\x1b[31mword{i}\x1b[m"),
            1 => format!("幅{i}"),
            _ => format!("plain{i}"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn unified_diff(hunks: usize) -> String {
    let mut diff = String::from("--- a.txt\n+++ b.txt\n");
    for h in 0..hunks {
        let start = h * 10 + 1;
        diff.push_str(&format!("@@ -{start},4 +{start},4 @@\n"));
        diff.push_str(&format!(" context {h}\n"));
        diff.push_str(&format!("-{}\n", colored_line(12)));
        diff.push_str(&format!("-removed {h}\n"));
        diff.push_str(&format!("+{}\n", colored_line(14)));
        diff.push_str(&format!("+added {h}\n"));
        diff.push_str(" trailing context\n");
    }
    diff
}

fn bench_fold(c: &mut Criterion) {
    let text = colored_line(200);
    let any = Folder::new(40).unwrap();
    let word = Folder::new(40).unwrap().with_boundary(Boundary::Word);

    c.bench_function("fold_chunks_any", |b| {
        b.iter(|| any.chunks(black_box(&text)).count())
    });
    c.bench_function("fold_chunks_word", |b| {
        b.iter(|| word.chunks(black_box(&text)).count())
    });

    let long = "abcdefghij".repeat(20_000);
    let wide = Folder::new(80).unwrap();
    c.bench_function("fold_chunks_200k_line", |b| {
        b.iter(|| wide.chunks(black_box(&long)).count())
    });
}

fn bench_session(c: &mut Criterion) {
    let diff = unified_diff(500);
    c.bench_function("render_unified_500_hunks", |b| {
        b.iter(|| {
            let options = Options {
                layout: Layout {
                    width: 120,
                    digits: Some(4),
                    ..Layout::default()
                },
                view: false,
            };
            let mut session = Session::new(options, ColorMap::with_defaults(), Vec::new());
            session.run(Cursor::new(black_box(diff.as_bytes()))).unwrap();
            session.into_inner().len()
        })
    });
}

criterion_group!(benches, bench_fold, bench_session);
criterion_main!(benches);
