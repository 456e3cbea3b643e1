use std::thread;

use vfl_core::tree::{
    serve,
    DtDataSet,
    DtFeature,
    NodeKey,
    NonTagParty,
    PartialModel,
    Request,
    RequestReceiver,
    Response,
    Sample,
    SplitValue,
    StopCondition,
    TagParty,
    Transport,
    TransportError,
};

fn non_tag_table(x: Vec<&str>) -> DtDataSet {
    DtDataSet::new(vec![DtFeature::from_column("x", x)]).unwrap()
}

fn tag_table() -> DtDataSet {
    DtDataSet::new(vec![
        DtFeature::from_column("z", vec!["p", "q", "p", "p", "q", "q"]),
        DtFeature::from_column("y", vec!["a", "a", "b", "b", "c", "c"]),
    ])
    .unwrap()
}

fn condition() -> StopCondition {
    StopCondition {
        sample_threshold: 1,
        depth_threshold: 3,
        gini_threshold: 0.0,
    }
}

#[test]
fn test_parties_as_thread_actors() {
    let (receiver, mut transport) = RequestReceiver::new();
    let peer = NonTagParty::new(
        non_tag_table(vec!["1", "1", "5", "6", "7", "5"]),
        "y",
        vec!["x".into()],
    )
    .with_prediction_set(non_tag_table(vec!["2", "9"]));
    let peer = thread::spawn(move || serve(receiver, peer));

    let tag = tag_table();
    let mut party = TagParty::new(tag.clone(), "y", vec![], condition()).unwrap();
    party.train(&mut transport).unwrap();
    assert_eq!(party.prune(&mut transport, 0.0).unwrap(), 0);

    // the peer routes the prediction samples, the tag party decides on z
    let sample = |z: &str| -> Sample {
        vec![("z".to_string(), z.to_string())]
            .into_iter()
            .collect()
    };
    assert_eq!(party.predict(&mut transport, 0, &sample("q")).unwrap(), "a");
    assert_eq!(party.predict(&mut transport, 1, &sample("p")).unwrap(), "b");
    assert_eq!(party.predict(&mut transport, 1, &sample("q")).unwrap(), "c");

    assert_eq!(transport.request(Request::Shutdown).unwrap(), Response::Closed);
    let peer = peer.join().unwrap();
    let root = peer.model().get(&NodeKey::new(0, 0)).unwrap();
    let split = root.split.as_ref().unwrap();
    assert_eq!(split.feature, "x");
    assert_eq!(split.value, SplitValue::Continuous(3.0));
    assert_eq!(peer.model().len(), 1);

    assert_eq!(
        transport.request(Request::Shutdown).unwrap_err(),
        TransportError::ChannelClosed,
    );
}

#[test]
fn test_training_error_vanishes_without_pruning() {
    let (receiver, mut transport) = RequestReceiver::new();
    let peer = NonTagParty::new(
        non_tag_table(vec!["1", "1", "5", "6", "7", "5"]),
        "y",
        vec!["x".into()],
    );
    let peer = thread::spawn(move || serve(receiver, peer));

    let tag = tag_table();
    let mut party = TagParty::new(tag.clone(), "y", vec![], condition()).unwrap();
    party.train(&mut transport).unwrap();
    party.prune(&mut transport, 0.0).unwrap();
    let predicted = party.predict_all(&mut transport, &tag).unwrap();
    assert_eq!(predicted, vec!["a", "a", "b", "b", "c", "c"]);

    // dropping the last transport stops the peer as well
    drop(transport);
    assert_eq!(peer.join().unwrap().model().len(), 1);
}

#[test]
fn test_binary_labels_are_separated_by_both_parties() {
    let (receiver, mut transport) = RequestReceiver::new();
    let peer = NonTagParty::new(
        non_tag_table(vec!["1", "1", "5", "6", "7", "5"]),
        "y",
        vec!["x".into()],
    );
    let peer = thread::spawn(move || serve(receiver, peer));

    let tag = DtDataSet::new(vec![
        DtFeature::from_column("z", vec!["p", "q", "p", "p", "q", "q"]),
        DtFeature::from_column("y", vec!["0", "0", "1", "1", "0", "0"]),
    ])
    .unwrap();
    let mut party = TagParty::new(tag.clone(), "y", vec![], condition()).unwrap();
    party.train(&mut transport).unwrap();
    assert_eq!(party.prune(&mut transport, 0.0).unwrap(), 0);
    let predicted = party.predict_all(&mut transport, &tag).unwrap();
    assert_eq!(predicted, vec!["0", "0", "1", "1", "0", "0"]);

    // z separates the root, x the left child
    let root = party.model().get(&NodeKey::new(0, 0)).unwrap();
    assert_eq!(root.split.as_ref().unwrap().feature, "z");
    assert!(party.model().get(&NodeKey::new(1, 0)).unwrap().split.is_none());

    drop(transport);
    let peer = peer.join().unwrap();
    let left = peer.model().get(&NodeKey::new(1, 0)).unwrap();
    assert_eq!(left.split.as_ref().unwrap().value, SplitValue::Continuous(3.0));
    assert_eq!(peer.model().len(), 1);
}
