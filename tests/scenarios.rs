use rustygcx::core::XmlLexer;
use rustygcx::{
    parse_path, Automaton, AutomatonBuilder, BufferIterator, DocumentStream, Error,
    IteratorOptions, LockPolicy, NodeId, ReadPolicy, RoleId, RunContext, StreamOptions,
    StreamPreProcessor, Transition,
};

const DOC: &str = "<a><b>1</b><b>2</b><c><b>3</b></c></a>";

type Stream<'a> = StreamPreProcessor<XmlLexer<&'a [u8]>>;

fn keep_all(xml: &str) -> Stream<'_> {
    StreamPreProcessor::from_bytes(xml.as_bytes(), Automaton::keep_everything(), RunContext::new())
}

fn iterator(stream: &mut Stream<'_>, path: &str) -> BufferIterator {
    let path = parse_path(path, &mut stream.context_mut().tags).unwrap();
    BufferIterator::new(stream.buffer().root(), path)
}

fn collect_texts(
    stream: &mut Stream<'_>,
    iter: &mut BufferIterator,
    read: ReadPolicy,
    lock: LockPolicy,
) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(node) = iter.get_next(stream, read, lock).unwrap() {
        // content must be complete before it is read
        while !stream.buffer().is_closed(node) {
            stream.read_next().unwrap();
        }
        out.push(stream.buffer().text_content(node));
    }
    out
}

#[test]
fn child_path_stays_at_its_depth() {
    let mut stream = keep_all(DOC);
    let mut iter = iterator(&mut stream, "/a/b");
    let texts = collect_texts(&mut stream, &mut iter, ReadPolicy::Structural, LockPolicy::Untouched);
    assert_eq!(texts, ["1", "2"]);
    // the `b` below `c` never became a match for the last step
    assert_eq!(iter.match_count(1), 2);
    // a, b, b, c: neither `c/b` nor its text is entered
    assert_eq!(iter.visited(), 4);

    let mut stream = keep_all(DOC);
    let path = parse_path("/a/b", &mut stream.context_mut().tags).unwrap();
    let options = IteratorOptions::default().with_skip_subtrees(false);
    let mut plain = BufferIterator::with_options(stream.buffer().root(), path, options);
    let texts = collect_texts(&mut stream, &mut plain, ReadPolicy::Structural, LockPolicy::Untouched);
    assert_eq!(texts, ["1", "2"]);
    assert_eq!(plain.visited(), 8);
}

#[test]
fn descendant_path_finds_every_depth() {
    let mut stream = keep_all(DOC);
    let mut iter = iterator(&mut stream, "//b");
    let texts = collect_texts(&mut stream, &mut iter, ReadPolicy::Structural, LockPolicy::Untouched);
    assert_eq!(texts, ["1", "2", "3"]);
}

#[test]
fn position_predicate_stops_pulling_at_first_match() {
    let mut stream = keep_all(DOC);
    let mut iter = iterator(&mut stream, "/a/b[position()=1]");
    let first = iter
        .get_next(&mut stream, ReadPolicy::Structural, LockPolicy::Untouched)
        .unwrap()
        .unwrap();
    // `<a>` and `<b>` only
    assert_eq!(stream.tokens_read(), 2);
    assert_eq!(stream.buffer().tag(first), stream.context().tags.lookup("b"));

    let mut stream = keep_all(DOC);
    let mut iter = iterator(&mut stream, "/a/b[position()=1]");
    let first = iter
        .get_next(&mut stream, ReadPolicy::UpToResultClose, LockPolicy::Untouched)
        .unwrap()
        .unwrap();
    assert_eq!(stream.tokens_read(), 4);
    assert_eq!(stream.buffer().text_content(first), "1");
    assert_eq!(
        iter.get_next(&mut stream, ReadPolicy::Structural, LockPolicy::Untouched)
            .unwrap(),
        None
    );
}

/// Buffers `a`, `a/b` (role 0), `a/c`, `a/c/b` (role 0) and the text
/// below any `b`.
fn role_automaton(ctx: &mut RunContext) -> (Automaton, RoleId) {
    let role = ctx.roles.register("b");
    let (a, b, c) = (ctx.tags.intern("a"), ctx.tags.intern("b"), ctx.tags.intern("c"));
    let mut builder = AutomatonBuilder::new();
    let sa = builder.keep_state();
    let sb = builder.keep_state();
    let sc = builder.keep_state();
    let st = builder.keep_state();
    builder
        .edge(Automaton::INITIAL, a, Transition::regular(sa))
        .edge(sa, b, Transition::regular(sb))
        .edge(sa, c, Transition::regular(sc))
        .edge(sc, b, Transition::regular(sb))
        .roles(sb, &[], &[role])
        .text(sb, st);
    (builder.build(), role)
}

#[test]
fn sign_off_collects_before_later_siblings_are_parsed() {
    let mut ctx = RunContext::new();
    let (automaton, role) = role_automaton(&mut ctx);
    let mut stream = StreamPreProcessor::from_bytes(DOC.as_bytes(), automaton, ctx);

    // <a> <b> 1 </b> <b> 2 </b>
    for _ in 0..7 {
        assert!(stream.read_next().unwrap());
    }
    let root = stream.buffer().root();
    let a = stream.buffer().first_child(root).unwrap();
    let bs: Vec<NodeId> = stream.buffer().children(a).collect();
    assert_eq!(bs.len(), 2);

    for &b in &bs {
        assert!(stream.buffer_mut().remove_role(b, role));
    }
    assert_eq!(stream.buffer().child_count(a), 0);
    assert!(bs.iter().all(|&b| !stream.buffer().contains(b)));
    assert_eq!(stream.buffer().stats().collected, 4);

    // <c> arrives only now
    stream.read_next().unwrap();
    assert_eq!(stream.buffer().child_count(a), 1);
}

#[test]
fn iterator_driven_sign_off_releases_everything() {
    let mut ctx = RunContext::new();
    let (automaton, role) = role_automaton(&mut ctx);
    let path = parse_path("//b", &mut ctx.tags).unwrap();
    let mut stream = StreamPreProcessor::from_bytes(DOC.as_bytes(), automaton, ctx);
    let mut iter = BufferIterator::new(stream.buffer().root(), path);

    let mut texts = Vec::new();
    while let Some(b) = iter
        .get_next(&mut stream, ReadPolicy::UpToResultClose, LockPolicy::LockEagerGc)
        .unwrap()
    {
        texts.push(stream.buffer().text_content(b));
        stream.buffer_mut().remove_role(b, role);
    }
    assert_eq!(texts, ["1", "2", "3"]);

    // releasing the last result cascades up through the closed ancestors
    let buffer = stream.buffer();
    assert_eq!(buffer.child_count(buffer.root()), 0);
    assert_eq!(buffer.stats().live, 1);
    assert!(buffer.stats().peak < 9);
}

#[test]
fn mismatched_close_is_fatal() {
    let mut stream = keep_all("<a><b>1</b></c></a>");
    let mut iter = iterator(&mut stream, "//b");
    let b = iter
        .get_next(&mut stream, ReadPolicy::Structural, LockPolicy::LockEagerGc)
        .unwrap()
        .unwrap();
    let err = loop {
        match iter.get_next(&mut stream, ReadPolicy::Structural, LockPolicy::LockEagerGc) {
            Ok(Some(_)) => continue,
            Ok(None) => panic!("malformed input was accepted"),
            Err(err) => break err,
        }
    };
    assert!(matches!(err, Error::Malformed { position: Some(11), .. }));

    assert!(stream.buffer().is_locked(b));
    iter.release(stream.buffer_mut());
    let buffer = stream.buffer();
    assert!(buffer
        .descendants_or_self(buffer.root())
        .into_iter()
        .all(|n| !buffer.is_locked(n)));
}

#[test]
fn close_before_any_open_is_fatal_in_lenient_mode() {
    let ctx = RunContext::with_options(StreamOptions::default().with_strict(false));
    let mut stream =
        StreamPreProcessor::from_bytes(b"</c><a/>".as_slice(), Automaton::keep_everything(), ctx);
    let err = stream.read_all().unwrap_err();
    assert!(err.is_malformed_input());
    assert_eq!(stream.buffer().child_count(stream.buffer().root()), 0);
}

#[test]
fn nested_iterators_share_one_stream() {
    let xml = "<r><a><b>1</b><b>2</b></a><a><b>3</b></a></r>";
    let mut stream = keep_all(xml);
    let inner_path = parse_path("b", &mut stream.context_mut().tags).unwrap();
    let mut outer = iterator(&mut stream, "//a");

    let mut seen = Vec::new();
    while let Some(a) = outer
        .get_next(&mut stream, ReadPolicy::Structural, LockPolicy::LockEagerGc)
        .unwrap()
    {
        let mut inner = BufferIterator::new(a, inner_path.clone());
        let texts =
            collect_texts(&mut stream, &mut inner, ReadPolicy::Structural, LockPolicy::LockEagerGc);
        seen.push(texts.join(","));
    }
    assert_eq!(seen, ["1,2", "3"]);
}

#[test]
fn two_iterators_lock_the_same_node() {
    let mut stream = keep_all(DOC);
    let mut first = iterator(&mut stream, "/a");
    let mut second = iterator(&mut stream, "/a");
    let lock = LockPolicy::LockDeferredGc;
    let a = first.get_next(&mut stream, ReadPolicy::Structural, lock).unwrap().unwrap();
    assert_eq!(second.get_next(&mut stream, ReadPolicy::Structural, lock).unwrap(), Some(a));
    assert_eq!(stream.buffer().node(a).unwrap().lock_count(), 2);

    first.release(stream.buffer_mut());
    assert!(stream.buffer().is_locked(a));
    second.release(stream.buffer_mut());
    assert!(!stream.buffer().is_locked(a));
}

#[test]
fn reads_from_a_file() {
    let path = std::env::temp_dir().join(format!("rustygcx-scenario-{}.xml", std::process::id()));
    std::fs::write(&path, format!("<?xml version=\"1.0\"?>\n{DOC}\n")).unwrap();

    let mut ctx = RunContext::with_options(StreamOptions::default().with_chunk_size(3));
    let query = parse_path("//c/b/text()", &mut ctx.tags).unwrap();
    let mut stream = StreamPreProcessor::open(&path, Automaton::keep_everything(), ctx).unwrap();
    let mut iter = BufferIterator::new(stream.buffer().root(), query);
    let node = iter
        .get_next(&mut stream, ReadPolicy::Structural, LockPolicy::Untouched)
        .unwrap()
        .unwrap();
    assert_eq!(stream.buffer().text_content(node), "3");
    std::fs::remove_file(&path).unwrap();
}
