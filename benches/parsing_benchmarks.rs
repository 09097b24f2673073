use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dep_linker_core::grammar::{GrammarHost, Language};

fn sample_source(language: Language) -> &'static str {
    match language {
        Language::TypeScript => {
            r#"
import { useState } from 'react';
import { Widget } from './widget';

interface Props {
    name: string;
}

class App {
    private props: Props;

    constructor(props: Props) {
        this.props = props;
    }

    render(): string {
        return useState(this.props.name).toString();
    }
}
"#
        }
        Language::JavaScript => {
            r#"
const { readFile } = require('fs');

class Loader {
    load(path) {
        return readFile(path, () => {});
    }
}

function main() {
    new Loader().load('a.txt');
}
"#
        }
        Language::Tsx => {
            r#"
import React from 'react';

export function Widget({ name }: { name: string }) {
    return <div>{name}</div>;
}
"#
        }
        Language::Python => {
            r#"
import os
from . import helpers

class Widget:
    def __init__(self, name):
        self.name = name

    def render(self):
        return helpers.format(self.name)
"#
        }
        Language::Go => {
            r#"
package widget

import (
    "fmt"
    "strings"
)

type Widget struct {
    Name string
}

func (w *Widget) Render() string {
    return fmt.Sprintf("%s", strings.ToUpper(w.Name))
}
"#
        }
        Language::Java => {
            r#"
package com.example.widget;

import java.util.List;

public class Widget {
    private String name;

    public Widget(String name) {
        this.name = name;
    }

    public String render() {
        return name.toUpperCase();
    }
}
"#
        }
        Language::Markdown => {
            r#"
# Widget

See [the source](./widget.ts) for details.

```typescript
class Widget {}
```
"#
        }
    }
}

fn benchmark_parse_per_language(c: &mut Criterion) {
    let host = GrammarHost::new();
    let languages = [
        Language::TypeScript,
        Language::Tsx,
        Language::JavaScript,
        Language::Python,
        Language::Go,
        Language::Java,
        Language::Markdown,
    ];

    let mut group = c.benchmark_group("parse_per_language");
    for language in languages {
        let source = sample_source(language);
        group.bench_with_input(BenchmarkId::new("parse", language.as_str()), &source, |b, source| {
            b.iter(|| black_box(host.parse(language, source).unwrap()));
        });
    }
    group.finish();
}

fn benchmark_parse_by_file_size(c: &mut Criterion) {
    let host = GrammarHost::new();
    let base = sample_source(Language::TypeScript);
    let sizes = [("small", 1), ("medium", 10), ("large", 50)];

    let mut group = c.benchmark_group("parse_by_file_size");
    for (name, repeat) in sizes {
        let source = base.repeat(repeat);
        group.bench_with_input(BenchmarkId::new("parse", name), &source, |b, source| {
            b.iter(|| black_box(host.parse(Language::TypeScript, source).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_parse_per_language, benchmark_parse_by_file_size);
criterion_main!(benches);
