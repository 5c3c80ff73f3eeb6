use chameleon::{ErrorPolicy, lexer::tokenize, parse_str, run};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::io;

// A reasonably complex program touching every form of the language
const PROGRAM: &str = r#"
; Bindings, arithmetic and printing
(let [radius 2.5
      area (* 3.14159 radius radius)
      half (// area 2)]
  (println area half (% 17 5)))

``
  Branching
``
(let [x 7]
  (if (> x 5)
      (then (print x) (println (- x 5)))
      (else (println 0)))
  (cond ((< x 3) (println 1))
        ((and (>= x 3) (<= x 10)) (println (/ x 2)))
        (else (println null))))

(let [a -1 b -2]
  (println (equal? a b) (nequal? a b) (or null a) not true? 0)
  (let [a 999 b b] (println a b)))
"#;

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pipeline");
    for copies in [1usize, 16, 128] {
        let input = PROGRAM.repeat(copies);
        group.bench_with_input(BenchmarkId::new("tokenize", copies), &input, |b, i| {
            b.iter(|| tokenize(black_box(i)))
        });
        group.bench_with_input(BenchmarkId::new("parse", copies), &input, |b, i| {
            b.iter(|| parse_str(black_box(i)))
        });
        group.bench_with_input(BenchmarkId::new("run", copies), &input, |b, i| {
            b.iter(|| run(black_box(i), io::sink(), ErrorPolicy::Halt))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
